//! Module `core`
//!
//! Control listener: accepts connections, enforces the connection limit and
//! spawns one task per connection until the service drains.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};

use super::connection::{ConnectionContext, handle_connection};
use super::registry::ConnectionRegistry;
use crate::commands::DefaultCommandFactory;
use crate::config::GatewayConfig;
use crate::error::{ServerError, TlsError};
use crate::hooks::{BusinessHooks, PeerInfo};
use crate::shutdown::ShutdownSignal;
use crate::tls::RustlsContextFactory;

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_clients: usize,
    registry: Arc<Mutex<ConnectionRegistry>>,
    context: Arc<ConnectionContext>,
    shutdown: ShutdownSignal,
}

fn tls_factory(config: &GatewayConfig) -> Result<Option<Arc<RustlsContextFactory>>, TlsError> {
    if !config.tls.enabled {
        return Ok(None);
    }
    match (&config.tls.cert_path, &config.tls.key_path) {
        (Some(cert), Some(key)) => Ok(Some(Arc::new(RustlsContextFactory::from_pem_files(
            cert,
            key,
            config.tls.client_ca_path.as_deref(),
        )?))),
        _ => Err(TlsError::Disabled),
    }
}

impl Server {
    /// Binds the control listener described by `config`.
    pub async fn bind(
        config: GatewayConfig,
        hooks: Option<Arc<dyn BusinessHooks>>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, ServerError> {
        let tls = tls_factory(&config)?;

        let addr = config.control_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("Server bound to {}", local_addr);

        let context = ConnectionContext {
            session_config: Arc::new(config.session_config()),
            factory: Arc::new(DefaultCommandFactory::new(config.max_command_length)),
            hooks,
            tls,
            settings: config.engine_settings(),
            shutdown: shutdown.clone(),
        };

        Ok(Self {
            listener,
            local_addr,
            max_clients: config.max_clients,
            registry: Arc::new(Mutex::new(ConnectionRegistry::new())),
            context: Arc::new(context),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Accepts connections until the service drains and every connection
    /// has finished. Connections arriving while draining get a 421.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            "Starting RAX FTP gateway on {} (max {} clients)",
            self.local_addr, self.max_clients
        );

        let mut connections = JoinSet::new();
        let mut draining = false;
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => self.spawn_connection(&mut connections, stream, peer_addr).await,
                    Err(e) => error!("Error accepting connection: {}", e),
                },
                _ = self.shutdown.wait_for_drain(), if !draining => {
                    draining = true;
                    info!("Draining {} connections", connections.len());
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_join(joined);
                }
            }

            if draining && connections.is_empty() {
                break;
            }
        }

        info!("Server on {} stopped", self.local_addr);
        Ok(())
    }

    async fn spawn_connection(
        &self,
        connections: &mut JoinSet<()>,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) {
        let local_addr = stream.local_addr().unwrap_or(self.local_addr);
        let peer = PeerInfo::new(peer_addr, local_addr);
        let admitted = self
            .registry
            .lock()
            .await
            .try_register(peer_addr, self.max_clients);

        let context = Arc::clone(&self.context);
        let registry = Arc::clone(&self.registry);
        connections.spawn(async move {
            handle_connection(stream, peer, context, admitted).await;
            if admitted {
                registry.lock().await.remove(&peer_addr);
            }
        });
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("Connection task panicked: {}", e);
        } else {
            warn!("Connection task cancelled: {}", e);
        }
    }
}
