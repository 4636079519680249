//! TCP Transport
//!
//! This module handles individual client connections to lineroute.
//! Each client gets its own reader task that runs in a loop, splitting the
//! byte stream into request lines and handing them to its [`Session`]. The
//! session's delivery task writes responses straight onto the socket through
//! [`TcpConnection`], so a response is only counted as sent once its write
//! has succeeded.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned (reader) + session delivery task (writer)
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split complete lines    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ session.handle_bytes()  │ │──> responses are written in
//!    │  └───────────┬─────────────┘ │    request order
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error
//!        │
//!        ▼
//! 5. Pending responses drained (clean close) or discarded (error)
//! ```
//!
//! A clean close is a plain EOF. The peer may only have shut down its write
//! side, so pending responses are still written; if it has gone away
//! entirely the first failed write marks the connection closed and the rest
//! are discarded.
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. TCP is a stream
//! protocol - we might receive half a line, or several lines in one read.

use crate::connection::session::{Connection, SendError, Session};
use crate::connection::stats::ConnectionStats;
use crate::protocol::{LineParser, ParseError};
use crate::router::Router;
use bytes::{Buf, BytesMut};
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Line terminator for responses
const CRLF: &[u8] = b"\r\n";

/// The outbound half of a TCP client, shared with its session.
#[derive(Debug)]
pub struct TcpConnection {
    id: String,
    open: AtomicBool,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
    stats: Arc<ConnectionStats>,
}

impl TcpConnection {
    fn new(id: String, write_half: OwnedWriteHalf, stats: Arc<ConnectionStats>) -> Self {
        Self {
            id,
            open: AtomicBool::new(true),
            writer: Mutex::new(BufWriter::new(write_half)),
            stats,
        }
    }

    /// Marks the connection closed. Later responses are discarded.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn send(&self, text: String) -> BoxFuture<'_, Result<(), SendError>> {
        Box::pin(async move {
            if !self.is_open() {
                return Err(SendError(self.id.clone()));
            }

            let mut writer = self.writer.lock().await;
            match write_line(&mut writer, &text).await {
                Ok(()) => {
                    let bytes = text.len() + CRLF.len();
                    self.stats.bytes_written(bytes);
                    trace!(client = %self.id, bytes = bytes, "Sent response");
                    Ok(())
                }
                Err(e) => {
                    debug!(client = %self.id, error = %e, "Write failed, closing connection");
                    self.close();
                    Err(SendError(self.id.clone()))
                }
            }
        })
    }
}

/// Handles a single client connection.
///
/// This struct owns the read half of the socket, the read buffer and the
/// session that routes each line.
pub struct ConnectionHandler {
    /// The read half of the TCP stream
    reader: OwnedReadHalf,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Line framing
    parser: LineParser,

    /// Routes lines and orders responses
    session: Session<TcpConnection>,

    /// Session delivery task, the only writer to the socket
    delivery: JoinHandle<()>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler and starts its delivery task.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `router` - The shared, fully registered router
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        router: Arc<Router>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (reader, write_half) = stream.into_split();
        let connection = Arc::new(TcpConnection::new(
            addr.to_string(),
            write_half,
            Arc::clone(&stats),
        ));
        let (session, delivery) = Session::open(router, connection, Arc::clone(&stats));

        Self {
            reader,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: LineParser::new(),
            session,
            delivery,
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads request lines from the client and routes them until
    /// the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        let clean = matches!(result, Ok(()) | Err(ConnectionError::ClientDisconnected));
        self.shutdown(clean).await;
        result
    }

    /// The main read-route loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while self.try_route_line().await? {}
            self.read_more_data().await?;
        }
    }

    /// Routes one complete line from the buffer, if there is one.
    async fn try_route_line(&mut self) -> Result<bool, ConnectionError> {
        let consumed = match self.parser.next_line(&self.buffer)? {
            Some((line, consumed)) => {
                trace!(client = %self.addr, bytes = line.len(), "Read line");
                // The session has already queued an ERR response for any
                // rejected line.
                let _ = self.session.handle_bytes(line).await;
                consumed
            }
            None => return Ok(false),
        };
        self.buffer.advance(consumed);
        Ok(true)
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Stops intake and waits for the delivery task to finish.
    ///
    /// On a clean close every pending response is still delivered. Otherwise
    /// the connection is marked closed first so in-flight results are
    /// discarded instead of written.
    async fn shutdown(self, clean: bool) {
        let ConnectionHandler {
            session,
            delivery,
            stats,
            ..
        } = self;

        if !clean {
            session.connection().close();
        }
        drop(session);

        let _ = delivery.await;
        stats.connection_closed();
    }
}

async fn write_line(stream: &mut BufWriter<OwnedWriteHalf>, text: &str) -> std::io::Result<()> {
    stream.write_all(text.as_bytes()).await?;
    stream.write_all(CRLF).await?;
    stream.flush().await
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Framing error (line too long)
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial line)
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The TCP stream for this connection
/// * `addr` - The client's socket address
/// * `router` - The shared router
/// * `stats` - Shared connection statistics
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Arc<Router>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, router, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

/// Accepts connections forever, one task per client.
pub async fn serve(listener: TcpListener, router: Arc<Router>, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let router = Arc::clone(&router);
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, router, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
