mod cli;

use reelhouse::{
    config::{self, Config},
    scanner::{self, FolderScanner, ScanMode, ScanOptions, ScanOutcome},
    server::{self, AppContext},
};
use reelhouse_av::{
    tools::get_tool_path, AutoExtractor, FfprobeExtractor, MediaInfoExtractor, MetadataExtractor,
};
use reelhouse_common::{FolderId, UserId};
use reelhouse_db::pool::{init_pool, DbPool};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting reelhouse server");

    let db = open_database(&config)?;
    let extractor = build_extractor(&config);
    let ctx = AppContext::new(config, db, extractor)?;

    server::start_server(ctx).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelhouse=trace,reelhouse_media=trace,reelhouse_db=debug,reelhouse_av=debug,tower_http=debug".to_string()
        } else {
            "reelhouse=debug,reelhouse_media=info,reelhouse_db=info,reelhouse_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::AddRoot {
            path,
            owner,
            no_autoscan,
        } => add_root(&path, owner, no_autoscan, cli.config.as_deref()),
        Commands::Scan { folder_id, full } => {
            let mode = if full { ScanMode::Full } else { ScanMode::Incremental };
            scan_folder(FolderId::from(folder_id), mode, cli.config.as_deref())
        }
        Commands::ScanAll => scan_all(cli.config.as_deref()),
        Commands::Unlock { folder_id } => unlock(FolderId::from(folder_id), cli.config.as_deref()),
        Commands::Inspect { file, json } => inspect_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("reelhouse {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_database(config: &Config) -> Result<DbPool> {
    let path = config::database_path(config);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
    }

    tracing::info!("Opening catalog at {}", path.display());
    init_pool(&path.to_string_lossy())
        .with_context(|| format!("Failed to open catalog: {:?}", path))
}

fn build_extractor(config: &Config) -> Arc<dyn MetadataExtractor> {
    let mediainfo = resolve_tool("mediainfo", config.tools.mediainfo_path.as_deref())
        .map(MediaInfoExtractor::with_program)
        .unwrap_or_default();
    let ffprobe = resolve_tool("ffprobe", config.tools.ffprobe_path.as_deref())
        .map(FfprobeExtractor::with_program)
        .unwrap_or_default();

    Arc::new(AutoExtractor::new(mediainfo, ffprobe))
}

/// Configured tool path if it exists, else the tool found on PATH.
fn resolve_tool(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    match get_tool_path(name, configured) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("{}; extraction through {} will fail", e, name);
            None
        }
    }
}

fn scanner_for(config: &Config) -> Result<FolderScanner> {
    let db = open_database(config)?;
    Ok(FolderScanner::new(
        db,
        build_extractor(config),
        ScanOptions::from_config(config),
    ))
}

fn add_root(path: &Path, owner: i64, no_autoscan: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db = open_database(&config)?;
    let conn = db.get()?;

    let path = path
        .canonicalize()
        .with_context(|| format!("Directory does not exist: {:?}", path))?;
    let folder = scanner::add_root(&conn, &path, UserId::from(owner), no_autoscan)?;

    println!("Root folder {} registered: {}", folder.id, folder.path);
    if folder.exclude_autoscan {
        println!("  Excluded from scheduled rescans");
    }

    Ok(())
}

fn scan_folder(folder_id: FolderId, mode: ScanMode, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let scanner = scanner_for(&config)?;

    let outcome = scanner.scan_with_mode(folder_id, mode)?;
    print_outcome(folder_id, &outcome);

    Ok(())
}

fn scan_all(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let scanner = scanner_for(&config)?;

    let outcomes = scanner.scan_all_roots()?;
    if outcomes.is_empty() {
        println!("No roots to scan");
    }
    for (folder_id, outcome) in &outcomes {
        print_outcome(*folder_id, outcome);
    }

    Ok(())
}

fn print_outcome(folder_id: FolderId, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::NotStarted => {
            println!("Folder {}: already being scanned, skipped", folder_id);
        }
        ScanOutcome::Vanished => {
            println!("Folder {}: directory no longer exists", folder_id);
        }
        ScanOutcome::Completed(report) | ScanOutcome::Cancelled(report) => {
            let state = if matches!(outcome, ScanOutcome::Completed(_)) {
                "scan complete"
            } else {
                "scan cancelled"
            };
            println!("Folder {}: {} in {}ms", folder_id, state, report.elapsed_ms);
            println!(
                "  Folders: {} created, {} updated, {} deleted",
                report.folders_created, report.folders_updated, report.folders_deleted
            );
            println!(
                "  Media: {} created, {} updated, {} deleted, {} unchanged",
                report.media_created,
                report.media_updated,
                report.media_deleted,
                report.files_unchanged
            );
            if report.extraction_failures > 0 {
                println!("  Extraction failures: {}", report.extraction_failures);
            }
        }
    }
}

fn unlock(folder_id: FolderId, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db = open_database(&config)?;
    let conn = db.get()?;

    if scanner::unlock(&conn, folder_id)? {
        println!("Folder {} unlocked", folder_id);
        Ok(())
    } else {
        anyhow::bail!("Folder not found: {}", folder_id)
    }
}

fn inspect_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let extractor = build_extractor(&config);
    let attrs = extractor
        .extract(file)
        .with_context(|| format!("Failed to inspect {:?}", file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&attrs)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", file.display());
        let secs = attrs.duration_ms / 1000;
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        println!("Resolution: {}x{}", attrs.width, attrs.height);
        println!("Bitrate: {} kbps", attrs.bitrate_kbps);

        println!("\nAudio Tracks: {}", attrs.audio_tracks.len());
        for (i, lang) in attrs.audio_tracks.iter().enumerate() {
            println!("  {}: {}", i + 1, lang);
        }
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = reelhouse_av::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {} [{}]", status, tool.name, tool.role);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::load_config_or_default(None)?;
            print_summary(&config);
        }
    }

    Ok(())
}

fn print_summary(config: &Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config::database_path(config).display());
    println!("  Roots: {}", config.library.roots.len());
    println!("  Extensions: {}", config.library.extensions.join(", "));
    match config.scan.schedule_interval_secs {
        Some(secs) => println!("  Rescan interval: {}s", secs),
        None => println!("  Rescan interval: disabled"),
    }
    println!("  Formats: {}", config.formats.len());
    println!("  Transcoders: {}", config.transcoders.len());
    for t in &config.transcoders {
        println!("    {} (sequence {}) -> {}", t.name, t.sequence, t.output_format);
    }
}
