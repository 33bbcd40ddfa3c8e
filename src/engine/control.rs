//! Module `control`
//!
//! The per-connection state machine and its lifecycle entry points:
//! connect, inbound line, transfer completion, shutdown and disconnect.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::channel::ControlChannel;
use crate::error::ProtocolError;
use crate::hooks::PeerInfo;
use crate::protocol::{Command, CommandCode, CommandFactory, ReplyCode};
use crate::session::Session;
use crate::shutdown::ShutdownSignal;
use crate::tls::TlsContextFactory;
use crate::transfer::{DataTransferControl, TransferOutcome};

/// Bounded waits and TLS policy applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// How long a new command waits for a running transfer before 503.
    pub admission_wait: Duration,
    /// How long disconnect waits for a running transfer to finish.
    pub disconnect_wait: Duration,
    pub require_client_auth: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            admission_wait: Duration::from_secs(1),
            disconnect_wait: Duration::from_secs(1),
            require_client_auth: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Ready,
    Processing,
    Closing,
    Closed,
}

pub struct ControlEngine<C: ControlChannel> {
    pub(super) session: Session,
    pub(super) channel: C,
    pub(super) factory: Arc<dyn CommandFactory>,
    pub(super) tls: Option<Arc<dyn TlsContextFactory<Handler = C::TlsHandler>>>,
    pub(super) shutdown: ShutdownSignal,
    pub(super) settings: EngineSettings,
    pub(super) peer: PeerInfo,
    pub(super) state: EngineState,
    finalized: bool,
}

impl<C: ControlChannel> ControlEngine<C> {
    pub fn new(
        session: Session,
        channel: C,
        factory: Arc<dyn CommandFactory>,
        shutdown: ShutdownSignal,
        peer: PeerInfo,
    ) -> Self {
        Self {
            session,
            channel,
            factory,
            tls: None,
            shutdown,
            settings: EngineSettings::default(),
            peer,
            state: EngineState::Init,
            finalized: false,
        }
    }

    pub fn with_tls(mut self, tls: Arc<dyn TlsContextFactory<Handler = C::TlsHandler>>) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// Whether the connection can still exchange replies.
    pub fn is_active(&self) -> bool {
        self.channel.is_open() && !matches!(self.state, EngineState::Closing | EngineState::Closed)
    }

    /// Greets a freshly accepted connection.
    pub async fn on_connect(&mut self) {
        self.state = EngineState::Init;

        if self.shutdown.is_draining() {
            info!("Client {} refused: service draining", self.peer.peer_addr);
            self.session.set_reply(
                ReplyCode::ServiceNotAvailable,
                "Service not available, closing control connection",
            );
            self.write_final_reply().await;
            return;
        }

        let connection = self.factory.connection();
        self.session.set_current_command(connection);

        if let Some(hooks) = self.session.hooks() {
            if let Err(error) = hooks.on_connected(&mut self.session, &self.peer).await {
                warn!(
                    "Client {} refused by connect hook: {}",
                    self.peer.peer_addr, error
                );
                self.session.set_reply_from_error(&error);
                let observed = hooks.after_run_ko(&mut self.session, &error).await;
                self.hook_failed("after_run_ko", observed);
                self.write_final_reply().await;
                self.close_channel().await;
                return;
            }
        }

        if self.run_command().await && self.channel.is_open() {
            self.session.set_ready(true);
            self.state = EngineState::Ready;
            debug!("Client {} ready", self.peer.peer_addr);
        }
    }

    /// Refuses a connection before any command runs, e.g. when the
    /// connection limit is reached.
    pub async fn reject_connection(&mut self, reason: &str) {
        info!("Client {} rejected: {}", self.peer.peer_addr, reason);
        self.session
            .set_reply(ReplyCode::ServiceNotAvailable, reason.to_string());
        self.write_final_reply().await;
    }

    /// Admits and runs one inbound line.
    pub async fn on_line(&mut self, line: &str) {
        if !self.is_active() {
            debug!("Client {} line ignored: connection closing", self.peer.peer_addr);
            return;
        }

        if self.shutdown.is_draining() {
            self.session.set_reply(
                ReplyCode::ServiceNotAvailable,
                "Service not available, closing control connection",
            );
            self.write_final_reply().await;
            return;
        }

        if !self.session.is_ready() {
            let error = ProtocolError::new(ReplyCode::ServiceNotAvailable, "Service not ready");
            self.refuse(error).await;
            return;
        }

        let command = self.factory.parse(line, &self.session);
        debug!("Client {} sent: {}", self.peer.peer_addr, command.verb());

        if !command.code().is_special()
            && transfer_still_running(self.session.data_transfer(), self.settings.admission_wait)
                .await
        {
            warn!(
                "Client {} sent {} while a transfer is executing",
                self.peer.peer_addr,
                command.verb()
            );
            let error = ProtocolError::new(
                ReplyCode::BadSequence,
                "Previous transfer command is not finished yet",
            );
            self.refuse(error).await;
            return;
        }

        self.session.set_reply_code(ReplyCode::CommandOk);

        if command.code().is_ssl_or_auth() {
            self.install_and_run(command).await;
            return;
        }

        let current = self.session.current_command();
        if current.is_next_command_valid(command.as_ref(), self.session.expected_next()) {
            let special = command.code().is_special();
            self.install_and_run(command).await;
            // Special commands are served out of band and never become the
            // command the next one is sequenced against.
            if special {
                self.session.restore_previous_command();
            }
        } else if !self.session.is_authenticated() {
            debug!(
                "Client {} sent {} before logging in",
                self.peer.peer_addr,
                command.verb()
            );
            self.session
                .set_reply(ReplyCode::NotLoggedIn, "Please login with USER and PASS");
            self.session
                .set_next_command(CommandCode::AUTHENTICATION_ENTRY);
            self.write_final_reply().await;
        } else {
            let replacement = self.factory.incorrect_sequence(command.as_ref());
            self.install_and_run(replacement).await;
        }
    }

    /// Reports a finished data transfer on the control connection.
    pub async fn on_transfer_done(&mut self, outcome: TransferOutcome) {
        if !self.is_active() {
            debug!(
                "Client {} transfer finished after close: {}",
                self.peer.peer_addr, outcome
            );
            return;
        }

        let observed = match self.session.hooks() {
            Some(hooks) => hooks.after_transfer_done(&mut self.session, &outcome).await,
            None => Ok(()),
        };
        match observed {
            Ok(()) => {
                let reply = outcome.reply();
                self.session.set_reply(reply.code(), reply.message());
            }
            Err(error) => {
                warn!(
                    "Client {} transfer hook failed after {}: {}",
                    self.peer.peer_addr, outcome, error
                );
                self.session.set_reply_from_error(&error);
            }
        }
        self.write_final_reply().await;
    }

    /// Runs the internal shutdown command and closes with 421.
    pub async fn on_shutdown(&mut self) {
        if !self.is_active() {
            return;
        }

        let command = self.factory.internal_shutdown();
        self.session.set_current_command(command);
        self.run_command().await;

        if self.is_active() {
            self.session.set_reply(
                ReplyCode::ServiceNotAvailable,
                "Service shutting down, closing control connection",
            );
            self.write_final_reply().await;
        }
    }

    /// Tears the session down. Only the first call has any effect.
    pub async fn on_disconnect(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if let Some(transfer) = self.session.data_transfer() {
            if transfer.is_executing()
                && transfer.wait_until_idle(self.settings.disconnect_wait).await
            {
                warn!(
                    "Client {} disconnected with a transfer still executing after {:?}, cancelling it",
                    self.peer.peer_addr, self.settings.disconnect_wait
                );
                transfer.clear();
            }
        }

        if let Some(hooks) = self.session.hooks() {
            let closed = hooks.on_closed(&mut self.session).await;
            self.hook_failed("on_closed", closed);
            let cleared = hooks.clear().await;
            self.hook_failed("clear", cleared);
        }
        self.session.clear();
        self.close_channel().await;
        info!("Client {} disconnected", self.peer.peer_addr);
    }

    async fn install_and_run(&mut self, command: Arc<dyn Command>) {
        self.session.set_current_command(command);
        self.run_command().await;
    }

    /// Refuses admission without touching the current command.
    async fn refuse(&mut self, error: ProtocolError) {
        self.session.set_reply_from_error(&error);
        if let Some(hooks) = self.session.hooks() {
            let observed = hooks.after_run_ko(&mut self.session, &error).await;
            self.hook_failed("after_run_ko", observed);
        }
        self.write_intermediate_reply().await;
    }

    /// Logs a hook failure that has no reply left to land in.
    pub(super) fn hook_failed(&self, hook: &str, result: Result<(), ProtocolError>) {
        if let Err(error) = result {
            warn!(
                "Client {} {} hook failed: {}",
                self.peer.peer_addr, hook, error
            );
        }
    }
}

/// Returns `true` when a transfer is still running once `wait` has elapsed.
async fn transfer_still_running(
    transfer: Option<Arc<dyn DataTransferControl>>,
    wait: Duration,
) -> bool {
    match transfer {
        Some(transfer) if transfer.is_executing() => transfer.wait_until_idle(wait).await,
        _ => false,
    }
}
