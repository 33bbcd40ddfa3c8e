//! FTP Protocol model
//!
//! Reply codes, command codes and the command contracts the control engine
//! works against.

pub mod codes;
pub mod command;
pub mod reply;

pub use codes::CommandCode;
pub use command::{Command, CommandFactory};
pub use reply::{Reply, ReplyCode, format_response};
