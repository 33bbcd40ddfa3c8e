//! Per-connection driver
//!
//! Owns one [`ControlEngine`] and feeds it lines, transfer completions and
//! the drain signal, strictly one event at a time.

use std::sync::Arc;

use log::debug;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use super::channel::TcpControlChannel;
use crate::engine::{ControlChannel, ControlEngine, EngineSettings};
use crate::error::EngineError;
use crate::hooks::{BusinessHooks, PeerInfo};
use crate::protocol::CommandFactory;
use crate::session::{Session, SessionConfig};
use crate::shutdown::ShutdownSignal;
use crate::tls::{RustlsContextFactory, TlsContextFactory};
use crate::transfer::{DataTransferControl, TransferTracker};

/// Everything a connection needs that is shared across the server.
pub(crate) struct ConnectionContext {
    pub session_config: Arc<SessionConfig>,
    pub factory: Arc<dyn CommandFactory>,
    pub hooks: Option<Arc<dyn BusinessHooks>>,
    pub tls: Option<Arc<RustlsContextFactory>>,
    pub settings: EngineSettings,
    pub shutdown: ShutdownSignal,
}

/// Serves one accepted control connection until it closes.
///
/// `admitted` is false when the connection limit was reached; the peer then
/// only receives a 421.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: PeerInfo,
    context: Arc<ConnectionContext>,
    admitted: bool,
) {
    let (tracker, mut completions) = TransferTracker::new();
    let transfer: Arc<dyn DataTransferControl> = tracker;
    let session = Session::new(
        Arc::clone(&context.session_config),
        context.factory.connection(),
        context.hooks.clone(),
        Some(transfer),
    );

    let mut engine = ControlEngine::new(
        session,
        TcpControlChannel::new(stream),
        Arc::clone(&context.factory),
        context.shutdown.clone(),
        peer,
    )
    .with_settings(context.settings);
    if let Some(tls) = &context.tls {
        let tls: Arc<dyn TlsContextFactory<Handler = TlsAcceptor>> = tls.clone();
        engine = engine.with_tls(tls);
    }

    if !admitted {
        engine
            .reject_connection("Too many connections, try again later")
            .await;
        engine.on_disconnect().await;
        return;
    }

    engine.on_connect().await;

    let shutdown = context.shutdown.clone();
    let mut drain_pending = true;
    while engine.is_active() {
        let reading = engine.channel().reads_enabled();
        tokio::select! {
            line = engine.channel_mut().read_line(), if reading => match line {
                Ok(Some(line)) => engine.on_line(&line).await,
                Ok(None) => {
                    debug!("Client {} closed the control connection", peer.peer_addr);
                    break;
                }
                Err(e) => {
                    engine.on_error(EngineError::Io(e)).await;
                    break;
                }
            },
            Some(outcome) = completions.recv() => engine.on_transfer_done(outcome).await,
            _ = shutdown.wait_for_drain(), if drain_pending => {
                drain_pending = false;
                engine.on_shutdown().await;
            }
            else => break,
        }
    }

    engine.on_disconnect().await;
}
