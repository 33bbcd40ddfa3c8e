//! Read-only, process-wide settings shared by every session.

use crate::auth::CredentialStore;

/// Values commands consult while executing. Built once from the gateway
/// configuration and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    banner: String,
    tls_available: bool,
    credentials: CredentialStore,
    max_username_length: usize,
}

impl SessionConfig {
    pub fn new(banner: impl Into<String>, credentials: CredentialStore) -> Self {
        Self {
            banner: banner.into(),
            tls_available: false,
            credentials,
            max_username_length: 32,
        }
    }

    pub fn with_tls(mut self, available: bool) -> Self {
        self.tls_available = available;
        self
    }

    pub fn with_max_username_length(mut self, length: usize) -> Self {
        self.max_username_length = length;
        self
    }

    /// Text of the 220 greeting.
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Whether AUTH can be honoured at all.
    pub fn tls_available(&self) -> bool {
        self.tls_available
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn max_username_length(&self) -> usize {
        self.max_username_length
    }
}
