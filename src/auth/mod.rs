//! Authentication system
//!
//! Credential storage and USER/PASS validation.

pub mod credentials;
pub mod validator;

pub use credentials::CredentialStore;
pub use validator::{validate_password, validate_user};
