//! Command parser - splits prefixed text into a command name and arguments

/// Recognizes `/name arg arg` style commands, with a configurable extra
/// prefix next to the platform-standard `/`.
pub struct CommandParser {
    command_prefix: String,
}

impl CommandParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    /// Parse command name and arguments out of a text message. Returns
    /// `None` for plain text. An `@botname` suffix on the command (group
    /// chat disambiguation) is dropped.
    pub fn parse(&self, text: &str) -> Option<(String, Vec<String>)> {
        let rest = text
            .strip_prefix('/')
            .or_else(|| text.strip_prefix(&self.command_prefix))?;

        let mut parts = rest.split_whitespace();
        let first = parts.next()?;
        let name = first.split('@').next().unwrap_or("").to_lowercase();
        if name.is_empty() {
            return None;
        }

        let args = parts.map(|s| s.to_string()).collect();
        Some((name, args))
    }

    /// True when the text would be treated as a command.
    pub fn is_command(&self, text: &str) -> bool {
        self.parse(text).is_some()
    }
}
