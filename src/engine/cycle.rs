//! Command execution cycle, reply and close policy, and the AUTH/CCC
//! protection switch.

use std::sync::Arc;

use log::{debug, info, warn};

use super::channel::ControlChannel;
use super::control::{ControlEngine, EngineState};
use crate::error::{ProtocolError, TlsError, TransferError};
use crate::hooks::BusinessHooks;
use crate::protocol::{Command, CommandCode, Reply};
use crate::session::TlsState;

impl<C: ControlChannel> ControlEngine<C> {
    /// Runs `before_run`, `exec` and `after_run_ok` for the installed
    /// command, then writes its reply. Returns `true` when no step failed.
    pub(super) async fn run_command(&mut self) -> bool {
        let command = self.session.current_command();
        let hooks = self.session.hooks();
        if !matches!(self.state, EngineState::Closing | EngineState::Closed) {
            self.state = EngineState::Processing;
        }

        let outcome = self.execute(&command, hooks.as_deref()).await;
        let succeeded = match outcome {
            Err(error) => {
                self.command_failed(&command, hooks.as_deref(), error).await;
                false
            }
            Ok(()) => {
                match command.code() {
                    CommandCode::Auth | CommandCode::Ccc => self.switch_tls(command.code()).await,
                    CommandCode::InternalShutdown => self.session.set_command_finished(),
                    _ => self.write_final_reply().await,
                }
                true
            }
        };

        if self.state == EngineState::Processing {
            self.state = if self.session.is_ready() {
                EngineState::Ready
            } else {
                EngineState::Init
            };
        }
        succeeded
    }

    async fn execute(
        &mut self,
        command: &Arc<dyn Command>,
        hooks: Option<&dyn BusinessHooks>,
    ) -> Result<(), ProtocolError> {
        if let Some(hooks) = hooks {
            hooks.before_run(&mut self.session).await?;
        }
        command.exec(&mut self.session).await?;
        if let Some(hooks) = hooks {
            hooks.after_run_ok(&mut self.session).await?;
        }
        Ok(())
    }

    async fn command_failed(
        &mut self,
        command: &Arc<dyn Command>,
        hooks: Option<&dyn BusinessHooks>,
        error: ProtocolError,
    ) {
        debug!(
            "Client {} command {} failed: {}",
            self.peer.peer_addr,
            command.verb(),
            error
        );
        self.session.set_reply_from_error(&error);
        if let Some(hooks) = hooks {
            let observed = hooks.after_run_ko(&mut self.session, &error).await;
            self.hook_failed("after_run_ko", observed);
        }

        if command.code() == CommandCode::InternalShutdown {
            self.session.set_command_finished();
        } else {
            self.write_final_reply().await;
        }

        // A failed control command must not leave a transfer running.
        if let Some(transfer) = self.session.data_transfer() {
            if transfer.is_executing() {
                match transfer.close_current_channel() {
                    Ok(()) => debug!(
                        "Client {} data channel closed after failed command",
                        self.peer.peer_addr
                    ),
                    Err(TransferError::NoConnection) => {}
                    Err(e) => warn!(
                        "Client {} could not close data channel: {}",
                        self.peer.peer_addr, e
                    ),
                }
            }
        }
    }

    /// Writes the session's reply. Closing codes (421, 221) release transfer
    /// bookkeeping first and close the connection once the reply is out.
    pub(super) async fn write_final_reply(&mut self) {
        let reply = self.session.reply().clone();

        if reply.is_closing() {
            self.state = EngineState::Closing;
            if let Some(transfer) = self.session.data_transfer() {
                transfer.clear();
            }
            self.send(&reply).await;
            self.session.set_command_finished();
            info!("Client {} closing: {}", self.peer.peer_addr, reply);
            self.close_channel().await;
        } else if self.send(&reply).await {
            self.session.set_command_finished();
        }
    }

    /// Writes the session's reply without completing the current command.
    pub(super) async fn write_intermediate_reply(&mut self) {
        let reply = self.session.reply().clone();
        self.send(&reply).await;
    }

    /// Returns `false` if the reply could not be written; the connection
    /// is closed in that case.
    async fn send(&mut self, reply: &Reply) -> bool {
        if !self.channel.is_open() {
            debug!(
                "Client {} reply dropped, connection closed: {}",
                self.peer.peer_addr, reply
            );
            return false;
        }

        match self.channel.write_reply(reply).await {
            Ok(()) => {
                debug!("Client {} reply: {}", self.peer.peer_addr, reply);
                true
            }
            Err(e) => {
                info!("Client {} aborted connection: {}", self.peer.peer_addr, e);
                self.session.set_exit_reason(format!("Write failed: {e}"));
                self.session.set_command_finished();
                self.close_channel().await;
                false
            }
        }
    }

    pub(super) async fn close_channel(&mut self) {
        if self.channel.is_open() {
            self.channel.close().await;
        }
        self.state = EngineState::Closed;
    }

    /// Sends the AUTH/CCC reply with reads paused, then adds or removes TLS
    /// on the live connection.
    async fn switch_tls(&mut self, code: CommandCode) {
        if self.session.reply().is_closing() {
            self.write_final_reply().await;
            return;
        }

        self.channel.set_reads_enabled(false);
        let reply = self.session.reply().clone();
        if !self.send(&reply).await {
            return;
        }
        self.session.set_command_finished();

        match code {
            CommandCode::Auth => self.upgrade_tls().await,
            _ => self.downgrade_tls().await,
        }

        if self.channel.is_open() {
            self.channel.set_reads_enabled(true);
        }
    }

    async fn upgrade_tls(&mut self) {
        if self.session.tls_state() != TlsState::Plain {
            debug!("Client {} already protected", self.peer.peer_addr);
            return;
        }

        let handler = match &self.tls {
            Some(factory) => factory.build_handler(self.settings.require_client_auth),
            None => Err(TlsError::Disabled),
        };
        let handler = match handler {
            Ok(handler) => handler,
            Err(e) => {
                self.tls_failed("TLS context unavailable", &e.to_string())
                    .await;
                return;
            }
        };

        if let Err(e) = self.session.prepare_ssl() {
            self.on_error(e.into()).await;
            return;
        }

        match self.channel.install_tls(handler).await {
            Ok(()) => match self.session.complete_ssl_upgrade() {
                Ok(()) => info!("Client {} control connection secured", self.peer.peer_addr),
                Err(e) => self.on_error(e.into()).await,
            },
            Err(e) => {
                if let Err(state) = self.session.abort_ssl_upgrade() {
                    warn!("Client {} {}", self.peer.peer_addr, state);
                }
                self.tls_failed("TLS handshake failed", &e.to_string())
                    .await;
            }
        }
    }

    async fn downgrade_tls(&mut self) {
        if self.session.tls_state() != TlsState::Secure {
            debug!("Client {} not protected, nothing to clear", self.peer.peer_addr);
            return;
        }

        if let Err(e) = self.session.prepare_ssl() {
            self.on_error(e.into()).await;
            return;
        }

        let removed = self.channel.remove_tls().await;
        if let Err(e) = self.session.complete_ssl_downgrade() {
            self.on_error(e.into()).await;
            return;
        }

        match removed {
            Ok(()) => info!("Client {} control connection cleared", self.peer.peer_addr),
            Err(e) => {
                warn!("Client {} TLS shutdown failed: {}", self.peer.peer_addr, e);
                self.session.set_exit_reason("TLS shutdown failed");
                self.close_channel().await;
            }
        }
    }

    async fn tls_failed(&mut self, message: &str, detail: &str) {
        warn!("Client {} {}: {}", self.peer.peer_addr, message, detail);
        if let Some(hooks) = self.session.hooks() {
            hooks.call_for_snmp(message, detail);
        }
        self.session.set_exit_reason(message);
        self.close_channel().await;
    }
}
