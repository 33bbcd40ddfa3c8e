//! Command contracts
//!
//! A `Command` is the object built for one inbound line. It knows its own
//! code, whether another command may follow it, and how to execute itself
//! against the session. The `CommandFactory` turns raw lines into commands.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProtocolError;
use crate::protocol::CommandCode;
use crate::session::Session;

#[async_trait]
pub trait Command: Send + Sync + fmt::Debug {
    fn code(&self) -> CommandCode;

    /// Verb text exactly as received (or the sentinel marker).
    fn verb(&self) -> &str;

    /// Argument text following the verb, trimmed.
    fn arg(&self) -> &str {
        ""
    }

    /// Whether `next` may legally follow this command.
    ///
    /// `expected` is the extra successor currently forced onto the session.
    fn is_next_command_valid(&self, next: &dyn Command, expected: Option<CommandCode>) -> bool {
        self.code().accepts_next(next.code(), expected)
    }

    /// Runs the command. On success the outcome is stored as the session's
    /// reply; on failure the returned error carries the reply to send.
    async fn exec(&self, session: &mut Session) -> Result<(), ProtocolError>;
}

/// Builds command objects. Parsing never fails: unusable input yields an
/// "incorrect command" value that replies with an error when executed.
pub trait CommandFactory: Send + Sync {
    fn parse(&self, line: &str, session: &Session) -> Arc<dyn Command>;

    /// Synthetic command installed when a connection is accepted.
    fn connection(&self) -> Arc<dyn Command>;

    /// Replacement for a command refused by the sequencing check.
    fn incorrect_sequence(&self, rejected: &dyn Command) -> Arc<dyn Command>;

    /// Sentinel run when the service drains.
    fn internal_shutdown(&self) -> Arc<dyn Command>;
}
