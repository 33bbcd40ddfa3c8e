//! Configuration management for the RAX FTP gateway
//!
//! Built-in defaults, then an optional `config.toml`, then `RAX_FTP__*`
//! environment overrides (`RAX_FTP__CONTROL_PORT`, `RAX_FTP__TLS__ENABLED`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::auth::CredentialStore;
use crate::engine::EngineSettings;
use crate::session::SessionConfig;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_CONTROL_PORT: u16 = 2121;
const DEFAULT_MAX_CLIENTS: usize = 10;
const DEFAULT_MAX_COMMAND_LENGTH: usize = 512;
const DEFAULT_MAX_USERNAME_LENGTH: usize = 32;
const DEFAULT_BANNER: &str = "Welcome to RAX FTP Gateway";
const DEFAULT_WAIT_MS: u64 = 1000;

/// Complete gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    // ═══ NETWORK ═══
    /// IP address to bind the FTP control connection
    pub bind_address: String,

    /// Port for FTP control connection
    pub control_port: u16,

    /// Maximum concurrent control connections
    pub max_clients: usize,

    // ═══ PROTOCOL ═══
    /// Maximum FTP command line length
    pub max_command_length: usize,

    pub max_username_length: usize,

    /// Text of the 220 greeting
    pub banner: String,

    /// How long a command waits for a running transfer before 503
    pub admission_wait_ms: u64,

    /// How long disconnect waits for a running transfer
    pub disconnect_wait_ms: u64,

    // ═══ SECURITY ═══
    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// Control channel protection (AUTH TLS)
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub client_ca_path: Option<PathBuf>,
    pub require_client_auth: bool,
}

/// One account allowed to log in
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub password: String,
}

impl GatewayConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        // Production path first, then development path
        let settings = defaults()?
            .add_source(File::with_name("rax-ftp-gateway/config").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(environment())
            .build()?;

        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from one file on top of the defaults, without
    /// environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = defaults()?
            .add_source(File::from(path))
            .build()?;

        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_port == 0 {
            return Err(ConfigError::Message("Control port cannot be 0".into()));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        if self.admission_wait_ms == 0 || self.disconnect_wait_ms == 0 {
            return Err(ConfigError::Message(
                "admission_wait_ms and disconnect_wait_ms must be greater than 0".into(),
            ));
        }

        if self.tls.enabled && (self.tls.cert_path.is_none() || self.tls.key_path.is_none()) {
            return Err(ConfigError::Message(
                "tls.cert_path and tls.key_path are required when TLS is enabled".into(),
            ));
        }

        if self.tls.require_client_auth && self.tls.client_ca_path.is_none() {
            return Err(ConfigError::Message(
                "tls.client_ca_path is required for client authentication".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::from_accounts(
            self.users
                .iter()
                .map(|user| (user.name.clone(), user.password.clone())),
        )
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.banner.clone(), self.credentials())
            .with_tls(self.tls.enabled)
            .with_max_username_length(self.max_username_length)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            admission_wait: Duration::from_millis(self.admission_wait_ms),
            disconnect_wait: Duration::from_millis(self.disconnect_wait_ms),
            require_client_auth: self.tls.require_client_auth,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_command_length: DEFAULT_MAX_COMMAND_LENGTH,
            max_username_length: DEFAULT_MAX_USERNAME_LENGTH,
            banner: DEFAULT_BANNER.to_string(),
            admission_wait_ms: DEFAULT_WAIT_MS,
            disconnect_wait_ms: DEFAULT_WAIT_MS,
            tls: TlsConfig::default(),
            users: Vec::new(),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
        .set_default("control_port", i64::from(DEFAULT_CONTROL_PORT))?
        .set_default("max_clients", DEFAULT_MAX_CLIENTS as i64)?
        .set_default("max_command_length", DEFAULT_MAX_COMMAND_LENGTH as i64)?
        .set_default("max_username_length", DEFAULT_MAX_USERNAME_LENGTH as i64)?
        .set_default("banner", DEFAULT_BANNER)?
        .set_default("admission_wait_ms", DEFAULT_WAIT_MS as i64)?
        .set_default("disconnect_wait_ms", DEFAULT_WAIT_MS as i64)?
        .set_default("tls.enabled", false)?
        .set_default("tls.require_client_auth", false)
}

fn environment() -> Environment {
    Environment::with_prefix("RAX_FTP")
        .separator("__")
        .try_parsing(true)
}
