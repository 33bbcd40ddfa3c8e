//! TLS context
//!
//! Builds the handlers the control channel installs on AUTH. Removing a
//! handler on CCC is a transport operation and lives on
//! [`ControlChannel`](crate::engine::ControlChannel).

pub mod acceptor;

use crate::error::TlsError;

pub use acceptor::RustlsContextFactory;

pub trait TlsContextFactory: Send + Sync {
    /// What the transport needs to run a server-side handshake.
    type Handler: Send;

    fn build_handler(&self, require_client_auth: bool) -> Result<Self::Handler, TlsError>;
}
