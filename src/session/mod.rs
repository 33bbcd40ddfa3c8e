//! Session management
//!
//! Per-connection state, its TLS protection state machine and the shared
//! read-only settings sessions are created with.

mod settings;
mod state;
mod tls;

pub use settings::SessionConfig;
pub use state::Session;
pub use tls::TlsState;
