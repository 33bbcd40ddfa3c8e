//! Business hooks
//!
//! Pluggable callbacks the embedding application supplies around every
//! command cycle and at connection lifecycle edges. Every method has a no-op
//! default so implementations only override what they care about.

pub mod logging;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::{EngineError, ProtocolError};
use crate::session::Session;
use crate::transfer::TransferOutcome;

pub use logging::LoggingHooks;

/// Addresses of an accepted control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
}

impl PeerInfo {
    pub fn new(peer_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            local_addr,
        }
    }
}

/// Callbacks invoked by the control engine.
///
/// Every hook may fail with a [`ProtocolError`]. Inside the command cycle
/// (`before_run`, `after_run_ok`) the error becomes the reply and the cycle
/// continues with `after_run_ko`; a failing `after_transfer_done` replaces
/// the transfer's reply. Failures from the remaining hooks are logged and
/// never stop the engine. Hooks only see the session and the peer
/// addresses, never the engine.
#[async_trait]
pub trait BusinessHooks: Send + Sync {
    /// Runs once after the synthetic connection command is installed and
    /// before it executes. May replace the session's current command.
    async fn on_connected(
        &self,
        _session: &mut Session,
        _peer: &PeerInfo,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Runs once when the connection becomes inactive, before `clear`.
    async fn on_closed(&self, _session: &mut Session) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Releases whatever the hook set holds for this connection.
    async fn clear(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn before_run(&self, _session: &mut Session) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn after_run_ok(&self, _session: &mut Session) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Observes every failed cycle and every refused admission.
    async fn after_run_ko(
        &self,
        _session: &mut Session,
        _error: &ProtocolError,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn on_local_exception(
        &self,
        _session: &mut Session,
        _cause: &EngineError,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn after_transfer_done(
        &self,
        _session: &mut Session,
        _outcome: &TransferOutcome,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Diagnostic side channel raised when a TLS upgrade fails.
    fn call_for_snmp(&self, _message: &str, _detail: &str) {}
}
