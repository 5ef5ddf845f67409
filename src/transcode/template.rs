//! Command templates with `%`-token substitution.

use super::TranscodeError;

/// Values substituted into a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValues {
    /// `%i`
    pub input: String,
    /// `%s`, formatted `H:MM:SS`
    pub seek: String,
    /// `%d`
    pub duration: String,
    /// `%b`
    pub bitrate: String,
    /// `%r`
    pub resolution: String,
    /// `%l`
    pub language: String,
}

impl TemplateValues {
    fn lookup(&self, token: char) -> Option<&str> {
        match token {
            'i' => Some(&self.input),
            's' => Some(&self.seek),
            'd' => Some(&self.duration),
            'b' => Some(&self.bitrate),
            'r' => Some(&self.resolution),
            'l' => Some(&self.language),
            _ => None,
        }
    }
}

/// A command split into arguments.
///
/// Splitting happens once, on whitespace, before any substitution, so a
/// value containing spaces stays a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(command: &str) -> Result<Self, TranscodeError> {
        let args: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if args.is_empty() {
            return Err(TranscodeError::EmptyCommand);
        }
        Ok(Self { args })
    }

    /// The program, before substitution.
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Produce the argument vector for one invocation.
    pub fn render(&self, values: &TemplateValues) -> Vec<String> {
        self.args.iter().map(|arg| substitute(arg, values)).collect()
    }
}

/// Replace `%x` tokens in one argument. Inserted values are not scanned
/// again; unknown tokens are left as written.
fn substitute(arg: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut chars = arg.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(value) = chars.peek().and_then(|next| values.lookup(*next)) {
                out.push_str(value);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> TemplateValues {
        TemplateValues {
            input: "/videos/My Movie (2001).mkv".to_string(),
            seek: "0:01:05".to_string(),
            duration: "10".to_string(),
            bitrate: "1500".to_string(),
            resolution: "640x360".to_string(),
            language: "2".to_string(),
        }
    }

    #[test]
    fn test_render_all_tokens() {
        let template =
            CommandTemplate::parse("ffmpeg -ss %s -i %i -t %d -b:v %bk -s %r -map 0:%l pipe:1")
                .unwrap();

        assert_eq!(
            template.render(&values()),
            vec![
                "ffmpeg",
                "-ss",
                "0:01:05",
                "-i",
                "/videos/My Movie (2001).mkv",
                "-t",
                "10",
                "-b:v",
                "1500k",
                "-s",
                "640x360",
                "-map",
                "0:2",
                "pipe:1",
            ]
        );
    }

    #[test]
    fn test_values_not_rescanned() {
        let mut vals = values();
        vals.input = "/videos/100%d.mkv".to_string();

        let template = CommandTemplate::parse("cat %i").unwrap();
        assert_eq!(template.render(&vals), vec!["cat", "/videos/100%d.mkv"]);
    }

    #[test]
    fn test_unknown_tokens_kept() {
        let template = CommandTemplate::parse("echo 50% %x %").unwrap();
        assert_eq!(template.render(&values()), vec!["echo", "50%", "%x", "%"]);
    }

    #[test]
    fn test_split_on_any_whitespace() {
        let template = CommandTemplate::parse("  cat\t%i \n").unwrap();
        assert_eq!(template.program(), "cat");
        assert_eq!(template.args().len(), 2);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandTemplate::parse("   "),
            Err(TranscodeError::EmptyCommand)
        ));
    }
}
