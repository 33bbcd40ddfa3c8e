//! Error types
//!
//! Defines domain-specific error types for each module of the gateway.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::{Reply, ReplyCode};
use crate::session::TlsState;

/// Command-level failure carrying the reply the peer must receive.
///
/// This is the tagged outcome of `before_run`, `exec` and `after_run_ok`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {message}")]
pub struct ProtocolError {
    code: ReplyCode,
    message: String,
}

impl ProtocolError {
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: ReplyCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn code(&self) -> ReplyCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_reply(&self) -> Reply {
        Reply::new(self.code, self.message.clone())
    }
}

/// Everything that can reach `ControlEngine::on_error`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("connection setup failed: {0}")]
    ConnectFailure(#[source] io::Error),
    #[error("connection already closed")]
    ConnectionAlreadyClosed,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("task rejected: {0}")]
    Rejected(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Session state errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("illegal TLS transition from {from:?} to {to:?}")]
    IllegalTlsTransition { from: TlsState, to: TlsState },
}

impl From<SessionError> for EngineError {
    fn from(error: SessionError) -> Self {
        EngineError::InvariantViolation(error.to_string())
    }
}

/// Data transfer control errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("no data connection")]
    NoConnection,
    #[error("a transfer is already executing")]
    AlreadyExecuting,
}

/// TLS context errors
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS is not configured")]
    Disabled,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no certificate found in {0}")]
    NoCertificates(PathBuf),
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error("client authentication requested but no client CA is configured")]
    MissingClientCa,
    #[error("client certificate verifier: {0}")]
    ClientVerifier(String),
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Authentication module errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
    #[error("Invalid password for user: {0}")]
    InvalidPassword(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("User not logged in")]
    NotLoggedIn,
}

/// Server shell errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
}
