//! RAX FTP gateway
//!
//! FTP control connection engine: command admission, transfer mutual
//! exclusion, business hooks, reply and close policy, and in-place
//! AUTH/CCC protection changes, plus the TCP server that hosts it.

pub mod auth;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod tls;
pub mod transfer;

pub use config::GatewayConfig;
pub use engine::{ControlChannel, ControlEngine, EngineSettings, EngineState};
pub use hooks::{BusinessHooks, LoggingHooks, PeerInfo};
pub use server::Server;
pub use session::{Session, SessionConfig, TlsState};
pub use shutdown::ShutdownSignal;
