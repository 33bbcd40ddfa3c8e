//! Credential storage
//!
//! Holds the accounts allowed to log in, as loaded from configuration.

use std::collections::HashMap;

/// In-memory account table: user name to password.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    accounts: HashMap<String, String>,
}

impl CredentialStore {
    pub fn from_accounts<I, U, P>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            accounts: accounts
                .into_iter()
                .map(|(user, password)| (user.into(), password.into()))
                .collect(),
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.accounts.contains_key(username)
    }

    /// `None` when the account does not exist.
    pub fn password_matches(&self, username: &str, password: &str) -> Option<bool> {
        self.accounts.get(username).map(|stored| stored == password)
    }
}
