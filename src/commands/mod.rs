//! Built-in command set
//!
//! Parsing of control lines, the default command factory and the handlers
//! behind each built-in verb.

mod builtin;
mod factory;
mod handlers;
mod parser;

pub use builtin::BuiltinCommand;
pub use factory::DefaultCommandFactory;
pub use parser::{CommandLine, parse_command_line};
