//! Module `builtin`
//!
//! The command object the default factory builds for every line.

use async_trait::async_trait;

use super::handlers;
use super::parser::CommandLine;
use crate::error::ProtocolError;
use crate::protocol::{Command, CommandCode};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct BuiltinCommand {
    code: CommandCode,
    verb: String,
    arg: String,
    detail: Option<String>,
}

impl BuiltinCommand {
    /// A recognised client verb.
    pub fn parsed(code: CommandCode, line: CommandLine) -> Self {
        Self {
            code,
            verb: line.verb,
            arg: line.arg,
            detail: None,
        }
    }

    /// One of the engine's synthetic commands.
    pub fn sentinel(code: CommandCode) -> Self {
        Self {
            code,
            verb: code.verb().to_string(),
            arg: String::new(),
            detail: None,
        }
    }

    /// Input that could not be turned into a known verb. `verb` keeps the
    /// raw token; `detail` becomes the text of the 500 reply.
    pub fn incorrect(verb: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: CommandCode::IncorrectCommand,
            verb: verb.into(),
            arg: String::new(),
            detail: Some(detail.into()),
        }
    }

    /// Stand-in for a command refused by the sequencing check.
    pub fn incorrect_sequence(rejected: &dyn Command) -> Self {
        Self {
            code: CommandCode::IncorrectSequence,
            verb: rejected.verb().to_string(),
            arg: String::new(),
            detail: None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

#[async_trait]
impl Command for BuiltinCommand {
    fn code(&self) -> CommandCode {
        self.code
    }

    fn verb(&self) -> &str {
        &self.verb
    }

    fn arg(&self) -> &str {
        &self.arg
    }

    async fn exec(&self, session: &mut Session) -> Result<(), ProtocolError> {
        handlers::dispatch(self, session)
    }
}
