//! Server core functionality
//!
//! TCP listener, control channel transport, per-connection driver and the
//! connection registry.

pub mod channel;
mod connection;
pub mod core;
pub mod registry;

pub use self::channel::{ControlStream, TcpControlChannel};
pub use self::core::Server;
pub use self::registry::ConnectionRegistry;
