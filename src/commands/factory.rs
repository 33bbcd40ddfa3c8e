//! Module `factory`
//!
//! Default [`CommandFactory`]: turns every line, however malformed, into a
//! [`BuiltinCommand`].

use std::sync::Arc;

use super::builtin::BuiltinCommand;
use super::parser::parse_command_line;
use crate::protocol::{Command, CommandCode, CommandFactory};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct DefaultCommandFactory {
    max_line_length: usize,
}

impl DefaultCommandFactory {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

impl Default for DefaultCommandFactory {
    fn default() -> Self {
        Self::new(512)
    }
}

impl CommandFactory for DefaultCommandFactory {
    fn parse(&self, line: &str, _session: &Session) -> Arc<dyn Command> {
        let parsed = parse_command_line(line);

        if line.len() > self.max_line_length {
            return Arc::new(BuiltinCommand::incorrect(parsed.verb, "Command line too long"));
        }
        if parsed.verb.is_empty() {
            return Arc::new(BuiltinCommand::incorrect("", "Empty command"));
        }

        match CommandCode::from_verb(&parsed.verb) {
            Some(code) => Arc::new(BuiltinCommand::parsed(code, parsed)),
            None => {
                let detail = format!("'{}': command not understood", parsed.verb);
                Arc::new(BuiltinCommand::incorrect(parsed.verb, detail))
            }
        }
    }

    fn connection(&self) -> Arc<dyn Command> {
        Arc::new(BuiltinCommand::sentinel(CommandCode::Connection))
    }

    fn incorrect_sequence(&self, rejected: &dyn Command) -> Arc<dyn Command> {
        Arc::new(BuiltinCommand::incorrect_sequence(rejected))
    }

    fn internal_shutdown(&self) -> Arc<dyn Command> {
        Arc::new(BuiltinCommand::sentinel(CommandCode::InternalShutdown))
    }
}
