//! Logging hooks
//!
//! Default hook set used by the binary: logs connection lifecycle,
//! commands and failures.

use async_trait::async_trait;
use log::{debug, error, info, warn};

use super::{BusinessHooks, PeerInfo};
use crate::error::{EngineError, ProtocolError};
use crate::session::Session;
use crate::transfer::TransferOutcome;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

fn user_label(session: &Session) -> &str {
    session.username().map(String::as_str).unwrap_or("-")
}

#[async_trait]
impl BusinessHooks for LoggingHooks {
    async fn on_connected(
        &self,
        _session: &mut Session,
        peer: &PeerInfo,
    ) -> Result<(), ProtocolError> {
        info!("Client connected: {} on {}", peer.peer_addr, peer.local_addr);
        Ok(())
    }

    async fn on_closed(&self, session: &mut Session) -> Result<(), ProtocolError> {
        match session.exit_reason() {
            Some(reason) => info!("Client {} disconnected: {}", user_label(session), reason),
            None => info!("Client {} disconnected", user_label(session)),
        }
        Ok(())
    }

    async fn before_run(&self, session: &mut Session) -> Result<(), ProtocolError> {
        let command = session.current_command();
        debug!("Client {} executing: {}", user_label(session), command.verb());
        Ok(())
    }

    async fn after_run_ko(
        &self,
        session: &mut Session,
        error: &ProtocolError,
    ) -> Result<(), ProtocolError> {
        let command = session.current_command();
        warn!(
            "Client {} command {} failed: {}",
            user_label(session),
            command.verb(),
            error
        );
        Ok(())
    }

    async fn on_local_exception(
        &self,
        session: &mut Session,
        cause: &EngineError,
    ) -> Result<(), ProtocolError> {
        error!("Client {} local failure: {}", user_label(session), cause);
        Ok(())
    }

    async fn after_transfer_done(
        &self,
        session: &mut Session,
        outcome: &TransferOutcome,
    ) -> Result<(), ProtocolError> {
        info!("Client {} transfer finished: {}", user_label(session), outcome);
        Ok(())
    }

    fn call_for_snmp(&self, message: &str, detail: &str) {
        error!("{message}: {detail}");
    }
}
