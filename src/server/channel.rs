//! Module `channel`
//!
//! TCP implementation of [`ControlChannel`]: a plain or rustls-wrapped
//! stream with cancel-safe line reads and in-place TLS install/removal.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rustls::ServerConnection;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf,
};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use crate::engine::ControlChannel;
use crate::protocol::Reply;

/// The byte stream under the control connection.
pub enum ControlStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for ControlStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            ControlStream::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ControlStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            ControlStream::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            ControlStream::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            ControlStream::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// How long CCC waits for the client's close_notify.
const CLOSE_NOTIFY_WAIT: Duration = Duration::from_secs(5);
const TLS_RECORD_HEADER: usize = 5;

pub struct TcpControlChannel {
    reader: Option<BufReader<ControlStream>>,
    /// Bytes of a line not yet terminated; survives cancelled reads.
    pending: Vec<u8>,
    reads_enabled: bool,
}

fn not_connected() -> io::Error {
    io::Error::from(io::ErrorKind::NotConnected)
}

/// Feeds the client's TLS records to `conn` one at a time until its
/// close_notify arrives. Reading whole records straight from the socket
/// leaves any plain text the client sends afterwards unread.
async fn await_close_notify(tcp: &mut TcpStream, conn: &mut ServerConnection) -> io::Result<()> {
    let drain = async {
        loop {
            let state = conn.process_new_packets().map_err(io::Error::other)?;
            if state.peer_has_closed() {
                return Ok::<(), io::Error>(());
            }
            if state.plaintext_bytes_to_read() > 0 {
                debug!(
                    "Dropping {} bytes sent after CCC",
                    state.plaintext_bytes_to_read()
                );
            }

            let mut header = [0u8; TLS_RECORD_HEADER];
            tcp.read_exact(&mut header).await?;
            let length = usize::from(u16::from_be_bytes([header[3], header[4]]));
            let mut record = vec![0u8; TLS_RECORD_HEADER + length];
            record[..TLS_RECORD_HEADER].copy_from_slice(&header);
            tcp.read_exact(&mut record[TLS_RECORD_HEADER..]).await?;
            conn.read_tls(&mut record.as_slice())?;
        }
    };
    match tokio::time::timeout(CLOSE_NOTIFY_WAIT, drain).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "client did not send close_notify",
        )),
    }
}

impl TcpControlChannel {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            reader: Some(BufReader::new(ControlStream::Plain(stream))),
            pending: Vec::new(),
            reads_enabled: true,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(
            self.reader.as_ref().map(BufReader::get_ref),
            Some(ControlStream::Tls(_))
        )
    }

    /// Reads the next line without its CRLF. `None` means the peer closed
    /// the connection.
    ///
    /// Safe to cancel: a partially received line is kept and completed by
    /// the next call.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let reader = self.reader.as_mut().ok_or_else(not_connected)?;
        let read = reader.read_until(b'\n', &mut self.pending).await?;
        if read == 0 && self.pending.is_empty() {
            return Ok(None);
        }

        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn take_stream(&mut self) -> io::Result<ControlStream> {
        let reader = self.reader.take().ok_or_else(not_connected)?;
        if !reader.buffer().is_empty() || !self.pending.is_empty() {
            warn!(
                "Discarding {} bytes received before the protection change",
                reader.buffer().len() + self.pending.len()
            );
        }
        self.pending.clear();
        Ok(reader.into_inner())
    }

    fn restore_stream(&mut self, stream: ControlStream) {
        self.reader = Some(BufReader::new(stream));
    }
}

#[async_trait]
impl ControlChannel for TcpControlChannel {
    type TlsHandler = TlsAcceptor;

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn reads_enabled(&self) -> bool {
        self.reads_enabled
    }

    fn set_reads_enabled(&mut self, enabled: bool) {
        self.reads_enabled = enabled;
    }

    async fn write_reply(&mut self, reply: &Reply) -> io::Result<()> {
        let stream = self.reader.as_mut().ok_or_else(not_connected)?.get_mut();
        stream.write_all(reply.to_wire().as_bytes()).await?;
        stream.flush().await
    }

    async fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if let Err(e) = reader.get_mut().shutdown().await {
                debug!("Control connection shutdown failed: {}", e);
            }
        }
        self.pending.clear();
    }

    async fn install_tls(&mut self, acceptor: TlsAcceptor) -> io::Result<()> {
        match self.take_stream()? {
            ControlStream::Plain(tcp) => {
                // A failed handshake consumes the socket; the channel stays closed.
                let tls = acceptor.accept(tcp).await?;
                self.restore_stream(ControlStream::Tls(Box::new(tls)));
                Ok(())
            }
            secure @ ControlStream::Tls(_) => {
                self.restore_stream(secure);
                Err(io::Error::other("TLS already active"))
            }
        }
    }

    async fn remove_tls(&mut self) -> io::Result<()> {
        match self.take_stream()? {
            ControlStream::Tls(mut tls) => {
                tls.get_mut().1.send_close_notify();
                let flushed = tls.flush().await;
                let (mut tcp, mut conn) = (*tls).into_inner();
                let cleared = match flushed {
                    Ok(()) => await_close_notify(&mut tcp, &mut conn).await,
                    Err(e) => Err(e),
                };
                self.restore_stream(ControlStream::Plain(tcp));
                cleared
            }
            plain @ ControlStream::Plain(_) => {
                self.restore_stream(plain);
                Err(io::Error::other("TLS not active"))
            }
        }
    }
}
