//! Connection Module
//!
//! This module manages client connections to lineroute. Each client
//! connection is handled by its own async task, allowing the server to handle
//! thousands of concurrent clients efficiently.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (serve / main.rs)                        │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept()
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ConnectionHandler (reader task)                             │
//! │   read bytes ──> split lines ──> Session::handle_bytes()    │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ one task per matched request
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Session delivery task: awaits responses in request order    │
//! │   (bounded queue, at most MAX_PENDING waiting)              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ Connection::send().await
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ TcpConnection: "<response>\r\n" onto the socket             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `session`: The transport-agnostic [`Connection`] trait and [`Session`]
//! - `handler`: The TCP implementation and accept loop
//! - `stats`: Shared counters
//!
//! ## Example
//!
//! ```ignore
//! use lineroute::connection::{serve, ConnectionStats};
//! use lineroute::router::Router;
//! use std::sync::Arc;
//!
//! let router = Arc::new(Router::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7878").await?;
//! serve(listener, router, stats).await;
//! ```

pub mod handler;
pub mod session;
pub mod stats;

// Re-export commonly used types
pub use handler::{handle_connection, serve, ConnectionError, ConnectionHandler, TcpConnection};
pub use session::{Connection, SendError, Session, MAX_PENDING};
pub use stats::ConnectionStats;
