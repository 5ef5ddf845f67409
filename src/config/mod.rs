mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse, validate and normalise configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;

    prepare(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./reelhouse.toml",
        "~/.config/reelhouse/config.toml",
        "/etc/reelhouse/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    prepare(&mut config);
    Ok(config)
}

/// Database file with `~` expanded.
pub fn database_path(config: &Config) -> PathBuf {
    let raw = config.database.path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

fn prepare(config: &mut Config) {
    for ext in config.library.extensions.iter_mut() {
        *ext = ext.trim_start_matches('.').to_lowercase();
    }
    config.library.extensions.retain(|e| !e.is_empty());

    for root in config.library.roots.iter_mut() {
        let raw = root.path.to_string_lossy();
        root.path = PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref());
    }

    for transcoder in config.transcoders.iter_mut() {
        for format in transcoder.input_formats.iter_mut() {
            *format = format.to_lowercase();
        }
    }
    config.transcoders.sort_by_key(|t| t.sequence);
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    // Validate server config
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.scan.batch_size == 0 {
        anyhow::bail!("Scan batch size must be at least 1");
    }

    if config.scan.schedule_interval_secs == Some(0) {
        anyhow::bail!("Scan schedule interval must be at least 1 second");
    }

    if config.library.extensions.is_empty() {
        anyhow::bail!("No file extensions configured for the library");
    }

    for root in &config.library.roots {
        if !root.path.is_absolute() {
            anyhow::bail!("Library root must be an absolute path: {:?}", root.path);
        }
        if !root.path.exists() {
            tracing::warn!("Library root does not exist: {:?}", root.path);
        }
    }

    let mut names = HashSet::new();
    for format in &config.formats {
        if !names.insert(format.name.as_str()) {
            anyhow::bail!("Format '{}' is defined more than once", format.name);
        }
    }

    for transcoder in &config.transcoders {
        if !transcoder.command.contains("%i") {
            anyhow::bail!(
                "Transcoder '{}' command has no %i input token",
                transcoder.name
            );
        }
        if transcoder.buffer_size_kb == 0 {
            anyhow::bail!("Transcoder '{}' buffer size cannot be 0", transcoder.name);
        }
        if config.format(&transcoder.output_format).is_none() {
            anyhow::bail!(
                "Transcoder '{}' outputs unknown format '{}'",
                transcoder.name,
                transcoder.output_format
            );
        }
        for input in &transcoder.input_formats {
            if config.format(input).is_none() {
                anyhow::bail!(
                    "Transcoder '{}' accepts unknown format '{}'",
                    transcoder.name,
                    input
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scan.batch_size, 100);
        assert!(!config.scan.trust_directory_mtime);
        assert_eq!(config.scan.job_retention_secs, 3600);
        assert!(config.format("mp4").unwrap().native);
        assert_eq!(config.format("ts").unwrap().mime_type, "video/mp2t");
        assert_eq!(config.transcoders.len(), 1);
        assert!(config.library.extensions.contains(&"mkv".to_string()));
    }

    #[test]
    fn test_default_config_is_valid() {
        let mut config = Config::default();
        prepare(&mut config);
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_transcoders_sorted_by_sequence() {
        let config = parse_config(
            r#"
            [[transcoders]]
            name = "late"
            sequence = 20
            command = "cat %i"

            [[transcoders]]
            name = "early"
            sequence = 5
            command = "cat %i"
            input_formats = ["MKV"]
            "#,
        )
        .unwrap();

        let names: Vec<_> = config.transcoders.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(config.transcoders[0].input_formats, vec!["mkv"]);
    }

    #[test]
    fn test_extensions_normalised() {
        let config = parse_config(
            r#"
            [library]
            extensions = [".MKV", "mp4", ""]
            "#,
        )
        .unwrap();
        assert_eq!(config.library.extensions, vec!["mkv", "mp4"]);
    }

    #[test]
    fn test_rejects_zero_port() {
        let err = parse_config("[server]\nport = 0\n").unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        assert!(parse_config("[scan]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn test_rejects_transcoder_without_input_token() {
        let err = parse_config(
            r#"
            [[transcoders]]
            name = "broken"
            command = "ffmpeg -i input.mkv pipe:1"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("%i"));
    }

    #[test]
    fn test_rejects_unknown_output_format() {
        assert!(parse_config(
            r#"
            [[transcoders]]
            name = "flv"
            command = "cat %i"
            output_format = "flv"
            "#,
        )
        .is_err());
    }

    #[test]
    fn test_rejects_duplicate_formats() {
        let err = parse_config(
            r#"
            [[formats]]
            name = "mp4"
            mime_type = "video/mp4"

            [[formats]]
            name = "mp4"
            mime_type = "video/mp4"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_relative_root() {
        let err = parse_config(
            r#"
            [[library.roots]]
            path = "videos"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelhouse.toml");
        std::fs::write(&path, "[server]\nport = 9191\nbase_url = \"http://tv:9191\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.base_url, "http://tv:9191");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(load_config(Path::new("/nonexistent/reelhouse.toml")).is_err());
    }
}
