//! # lineroute - A Line-Protocol Request Router
//!
//! lineroute serves User records over persistent, newline-framed
//! connections. Each inbound line is a request of the form
//! `VERB PATH [ARG...]`; each outbound line is `OK <payload>` or
//! `ERR <code> <message>`.
//!
//! ## Features
//!
//! - **Deterministic Routing**: literal segments beat dynamic ones, ties go
//!   to the route registered first
//! - **Ordered Responses**: responses on a connection leave in request order,
//!   even when handlers finish out of order
//! - **Contained Failures**: handler errors and panics become `ERR` lines and
//!   never close the connection
//! - **Async I/O**: Built on Tokio for handling thousands of concurrent connections
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              lineroute                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Session    │                  │
//! │  │ (Listener)  │    │  Handler    │    │ (per conn)  │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Line      │    │                 Router                       │   │
//! │  │   Parser    │    │  GET /users  GET /users/:id  POST /users ... │   │
//! │  └─────────────┘    └──────────────────────┬───────────────────────┘   │
//! │                                            │                           │
//! │                                            ▼                           │
//! │                     ┌──────────────────────────────────────────────┐   │
//! │                     │        User handlers + dyn UserStore         │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use lineroute::connection::{serve, ConnectionStats};
//! use lineroute::router::Router;
//! use lineroute::users::{register_routes, InMemoryUserStore};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryUserStore::new());
//!
//!     let mut router = Router::new();
//!     register_routes(&mut router, store)?;
//!
//!     let listener = TcpListener::bind("127.0.0.1:7878").await?;
//!     serve(listener, Arc::new(router), Arc::new(ConnectionStats::new())).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request/response types, line framing and request parsing
//! - [`router`]: Route table, matching and dispatch
//! - [`connection`]: Per-connection sessions and the TCP transport
//! - [`users`]: The User store and its CRUD handlers
//! - [`config`]: Command-line configuration

pub mod config;
pub mod connection;
pub mod protocol;
pub mod router;
pub mod users;

// Re-export commonly used types for convenience
pub use connection::{handle_connection, serve, Connection, ConnectionStats, Session};
pub use protocol::{parse_request, ParseError, Request, Response};
pub use router::{Handler, HandlerError, Router, RouterError};

/// The default port lineroute listens on
pub const DEFAULT_PORT: u16 = 7878;

/// The default host lineroute binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of lineroute
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
