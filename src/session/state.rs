//! Module `session`
//!
//! Defines the `Session` struct holding the mutable per-connection state the
//! control engine reads and mutates: the command in flight, the pending
//! reply, readiness, authentication and control channel protection.

use std::fmt;
use std::sync::Arc;

use crate::error::{ProtocolError, SessionError};
use crate::hooks::BusinessHooks;
use crate::protocol::{Command, CommandCode, Reply, ReplyCode};
use crate::session::SessionConfig;
use crate::session::tls::{TlsState, TlsTracker};
use crate::transfer::DataTransferControl;

/// State of one control connection.
///
/// Owned by the connection's worker; collaborators (`BusinessHooks`,
/// `DataTransferControl`) are shared references that `clear` releases.
pub struct Session {
    current_command: Arc<dyn Command>,
    previous_command: Option<Arc<dyn Command>>,
    expected_next: Option<CommandCode>,
    previous_expected: Option<CommandCode>,
    command_finished: bool,
    reply: Reply,
    ready: bool,
    authenticated: bool,
    username: Option<String>,
    is_user_valid: bool,
    tls: TlsTracker,
    exit_reason: Option<String>,
    data_transfer: Option<Arc<dyn DataTransferControl>>,
    hooks: Option<Arc<dyn BusinessHooks>>,
    config: Arc<SessionConfig>,
}

impl Session {
    pub fn new(
        config: Arc<SessionConfig>,
        initial_command: Arc<dyn Command>,
        hooks: Option<Arc<dyn BusinessHooks>>,
        data_transfer: Option<Arc<dyn DataTransferControl>>,
    ) -> Self {
        Self {
            current_command: initial_command,
            previous_command: None,
            expected_next: None,
            previous_expected: None,
            command_finished: true,
            reply: Reply::from_code(ReplyCode::ServiceReady),
            ready: false,
            authenticated: false,
            username: None,
            is_user_valid: false,
            tls: TlsTracker::default(),
            exit_reason: None,
            data_transfer,
            hooks,
            config,
        }
    }

    // --------------------
    // Command tracking
    // --------------------

    /// Installs the next command in flight. The previous one and its forced
    /// successor are kept so they can be handed back.
    pub fn set_current_command(&mut self, command: Arc<dyn Command>) {
        let previous = std::mem::replace(&mut self.current_command, command);
        self.previous_command = Some(previous);
        self.previous_expected = self.expected_next.take();
        self.command_finished = false;
    }

    pub fn current_command(&self) -> Arc<dyn Command> {
        Arc::clone(&self.current_command)
    }

    /// Puts the command that preceded the current one back in place,
    /// together with the successor that was forced onto it.
    pub fn restore_previous_command(&mut self) {
        if let Some(previous) = self.previous_command.take() {
            self.current_command = previous;
            self.expected_next = self.previous_expected.take();
        }
    }

    /// Forces an extra legal successor onto the current command.
    pub fn set_next_command(&mut self, code: CommandCode) {
        self.expected_next = Some(code);
    }

    pub fn expected_next(&self) -> Option<CommandCode> {
        self.expected_next
    }

    pub fn command_finished(&self) -> bool {
        self.command_finished
    }

    pub fn set_command_finished(&mut self) {
        self.command_finished = true;
    }

    // --------------------
    // Reply
    // --------------------

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    pub fn set_reply(&mut self, code: ReplyCode, message: impl Into<String>) {
        self.reply = Reply::new(code, message);
    }

    pub fn set_reply_code(&mut self, code: ReplyCode) {
        self.reply = Reply::from_code(code);
    }

    pub fn set_reply_from_error(&mut self, error: &ProtocolError) {
        self.reply = error.to_reply();
    }

    // --------------------
    // Connection flags
    // --------------------

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Returns whether the last USER command named a known account.
    pub fn is_user_valid(&self) -> bool {
        self.is_user_valid
    }

    pub fn set_user_valid(&mut self, valid: bool) {
        self.is_user_valid = valid;
    }

    pub fn username(&self) -> Option<&String> {
        self.username.as_ref()
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    /// Forgets the login identity; the connection itself stays up.
    pub fn logout(&mut self) {
        self.username = None;
        self.is_user_valid = false;
        self.authenticated = false;
    }

    pub fn exit_reason(&self) -> Option<&str> {
        self.exit_reason.as_deref()
    }

    pub fn set_exit_reason(&mut self, reason: impl Into<String>) {
        self.exit_reason = Some(reason.into());
    }

    // --------------------
    // TLS
    // --------------------

    pub fn tls_state(&self) -> TlsState {
        self.tls.state()
    }

    /// Marks the control channel as switching protection level.
    pub fn prepare_ssl(&mut self) -> Result<(), SessionError> {
        self.tls.prepare()
    }

    pub fn complete_ssl_upgrade(&mut self) -> Result<(), SessionError> {
        self.tls.secure()
    }

    pub fn complete_ssl_downgrade(&mut self) -> Result<(), SessionError> {
        self.tls.downgrade()
    }

    pub fn abort_ssl_upgrade(&mut self) -> Result<(), SessionError> {
        self.tls.abort_upgrade()
    }

    // --------------------
    // Collaborators
    // --------------------

    pub fn hooks(&self) -> Option<Arc<dyn BusinessHooks>> {
        self.hooks.clone()
    }

    pub fn data_transfer(&self) -> Option<Arc<dyn DataTransferControl>> {
        self.data_transfer.clone()
    }

    pub fn config(&self) -> Arc<SessionConfig> {
        Arc::clone(&self.config)
    }

    /// Releases collaborators and resets every flag. Called once, last, when
    /// the connection goes away.
    pub fn clear(&mut self) {
        self.hooks = None;
        self.data_transfer = None;
        self.previous_command = None;
        self.expected_next = None;
        self.previous_expected = None;
        self.command_finished = true;
        self.ready = false;
        self.logout();
        self.tls.reset();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("current_command", &self.current_command)
            .field("expected_next", &self.expected_next)
            .field("command_finished", &self.command_finished)
            .field("reply", &self.reply)
            .field("ready", &self.ready)
            .field("authenticated", &self.authenticated)
            .field("username", &self.username)
            .field("tls_state", &self.tls.state())
            .field("exit_reason", &self.exit_reason)
            .finish_non_exhaustive()
    }
}
