//! Line Protocol Router
//!
//! This module is the core of lineroute. It receives one decoded request line
//! at a time, finds the single route that should handle it, runs the handler
//! and normalizes whatever happens into a [`Response`](crate::protocol::Response).
//!
//! ## Architecture
//!
//! ```text
//! raw line
//!    │
//!    ▼
//! ┌─────────────────┐   MalformedRequest
//! │ parse_request() │ ──────────────────────┐
//! └────────┬────────┘                       │
//!          │                                │
//!          ▼                                │
//! ┌─────────────────┐   RouteNotFound       │
//! │ Router::resolve │ ──────────────────────┤
//! └────────┬────────┘                       │
//!          │ Dispatch                       │
//!          ▼                                ▼
//! ┌─────────────────┐               ┌──────────────┐
//! │ Dispatch::run() │ ────────────> │   Response   │
//! │ (handler, async)│  OK / ERR     │ OK.. / ERR.. │
//! └─────────────────┘               └──────────────┘
//! ```
//!
//! ## Error Codes
//!
//! - `MALFORMED_REQUEST`: fewer than two tokens, or not UTF-8
//! - `ROUTE_NOT_FOUND`: no route for the verb and path
//! - `DUPLICATE_ROUTE` / `INVALID_PATTERN`: registration-time only
//! - `NOT_FOUND`, `INVALID_ARGUMENT`, `UNAVAILABLE`, `HANDLER_ERROR`: raised by handlers

pub mod error;
pub mod handler;
pub mod pattern;
pub mod table;

// Re-export commonly used types
pub use error::{HandlerError, RouterError};
pub use handler::{reply, Handler, HandlerFuture, HandlerResult};
pub use pattern::Pattern;
pub use table::{Dispatch, Router};
