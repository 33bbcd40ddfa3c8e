//! Error taxonomy handling for a control connection.

use log::{debug, error, info, trace, warn};

use super::channel::ControlChannel;
use super::control::ControlEngine;
use crate::error::EngineError;
use crate::protocol::ReplyCode;

const INTERNAL_ERROR: &str = "Internal error";

impl<C: ControlChannel> ControlEngine<C> {
    /// Reacts to a failure raised while serving the connection.
    ///
    /// Protocol errors are ordinary outcomes and keep the connection open
    /// unless their own code is a closing one. Transport and unexpected
    /// failures record an exit reason and close with 421 when possible.
    pub async fn on_error(&mut self, cause: EngineError) {
        match cause {
            EngineError::ConnectFailure(ref e) => {
                debug!("Client {} connection setup failed: {}", self.peer.peer_addr, e);
            }
            EngineError::Rejected(ref reason) => {
                trace!("Client {} task rejected: {}", self.peer.peer_addr, reason);
            }
            EngineError::ConnectionAlreadyClosed => {
                debug!("Client {} connection already closed", self.peer.peer_addr);
                self.session.set_exit_reason(INTERNAL_ERROR);
                self.reply_if_open().await;
            }
            EngineError::Protocol(protocol) => {
                self.session.set_reply_from_error(&protocol);
                if let Some(hooks) = self.session.hooks() {
                    let observed = hooks.after_run_ko(&mut self.session, &protocol).await;
                    self.hook_failed("after_run_ko", observed);
                }
                if self.channel.is_open() {
                    self.write_final_reply().await;
                }
            }
            EngineError::InvariantViolation(ref detail) => {
                warn!("Client {} invariant violated: {}", self.peer.peer_addr, detail);
                self.session.set_exit_reason(format!("{INTERNAL_ERROR}: {detail}"));
                let hooks = self.session.hooks();
                if let (Some(hooks), Some(_)) = (hooks, self.session.data_transfer()) {
                    let observed = hooks.on_local_exception(&mut self.session, &cause).await;
                    self.hook_failed("on_local_exception", observed);
                }
                self.reply_if_open().await;
            }
            EngineError::Io(ref e) => {
                info!("Client {} aborted connection: {}", self.peer.peer_addr, e);
                self.local_failure(&cause).await;
            }
            EngineError::Unexpected(ref detail) => {
                error!("Client {} unexpected error: {}", self.peer.peer_addr, detail);
                self.local_failure(&cause).await;
            }
        }
    }

    async fn local_failure(&mut self, cause: &EngineError) {
        self.session.set_exit_reason(INTERNAL_ERROR);
        if let Some(hooks) = self.session.hooks() {
            let observed = hooks.on_local_exception(&mut self.session, cause).await;
            self.hook_failed("on_local_exception", observed);
        }
        self.reply_if_open().await;
    }

    async fn reply_if_open(&mut self) {
        if self.channel.is_open() {
            self.session.set_reply(
                ReplyCode::ServiceNotAvailable,
                "Internal error, closing control connection",
            );
            self.write_final_reply().await;
        }
    }
}
