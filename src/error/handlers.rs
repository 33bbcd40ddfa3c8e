//! Error handlers
//!
//! Maps domain errors onto FTP replies.

use crate::error::types::{AuthError, ProtocolError, TransferError};
use crate::protocol::ReplyCode;

/// Convert an authentication error to its FTP reply code
pub fn auth_error_to_ftp_code(err: &AuthError) -> ReplyCode {
    match err {
        AuthError::InvalidUsername(_) => ReplyCode::NotLoggedIn,
        AuthError::InvalidPassword(_) => ReplyCode::NotLoggedIn,
        AuthError::UserNotFound(_) => ReplyCode::NotLoggedIn,
        AuthError::MalformedInput(_) => ReplyCode::SyntaxErrorInParameters,
        AuthError::NotLoggedIn => ReplyCode::NotLoggedIn,
    }
}

impl From<AuthError> for ProtocolError {
    fn from(err: AuthError) -> Self {
        let code = auth_error_to_ftp_code(&err);
        // Never echo which part of the credentials was wrong.
        let message = match err {
            AuthError::MalformedInput(detail) => detail,
            _ => "Login incorrect".to_string(),
        };
        ProtocolError::new(code, message)
    }
}

impl From<TransferError> for ProtocolError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::NoConnection => {
                ProtocolError::new(ReplyCode::CantOpenDataConnection, err.to_string())
            }
            TransferError::AlreadyExecuting => {
                ProtocolError::new(ReplyCode::BadSequence, err.to_string())
            }
        }
    }
}
