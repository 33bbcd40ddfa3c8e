//! Command line parsing
//!
//! Splits a raw control line into its verb token and argument text.

/// One inbound line split into verb and argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Verb token exactly as the client sent it.
    pub verb: String,
    pub arg: String,
}

// Parse raw command string into verb and argument
pub fn parse_command_line(raw: &str) -> CommandLine {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();

    CommandLine {
        verb: verb.to_string(),
        arg: arg.to_string(),
    }
}
