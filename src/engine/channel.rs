//! Control channel transport contract
//!
//! What the engine needs from the connection it drives. The TCP
//! implementation lives in `server::channel`; tests use in-memory doubles.

use std::io;

use async_trait::async_trait;

use crate::protocol::Reply;

#[async_trait]
pub trait ControlChannel: Send {
    /// Handler produced by the TLS context factory and consumed by
    /// [`install_tls`](ControlChannel::install_tls).
    type TlsHandler: Send + 'static;

    fn is_open(&self) -> bool;

    /// Whether the driver should keep reading lines from the peer.
    fn reads_enabled(&self) -> bool;

    fn set_reads_enabled(&mut self, enabled: bool);

    /// Writes and flushes one reply.
    async fn write_reply(&mut self, reply: &Reply) -> io::Result<()>;

    async fn close(&mut self);

    /// Runs a server-side TLS handshake over the open connection.
    async fn install_tls(&mut self, handler: Self::TlsHandler) -> io::Result<()>;

    /// Ends the TLS session and keeps talking plain text on the same
    /// connection.
    async fn remove_tls(&mut self) -> io::Result<()>;
}
