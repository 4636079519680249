//! Users Module
//!
//! The User feature served over the line protocol: a storage capability and
//! the CRUD handlers that sit on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌────────────────────┐
//! │     Router      │────>│  user handlers   │────>│  dyn UserStore     │
//! │ (GET /users/:id)│     │  (routes.rs)     │     │  InMemoryUserStore │
//! └─────────────────┘     └──────────────────┘     └────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use lineroute::router::Router;
//! use lineroute::users::{register_routes, InMemoryUserStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryUserStore::new());
//! let mut router = Router::new();
//! register_routes(&mut router, store).unwrap();
//! assert_eq!(router.len(), 9);
//! ```

pub mod routes;
pub mod store;

// Re-export commonly used types
pub use routes::register_routes;
pub use store::{InMemoryUserStore, StoreError, StoreFuture, User, UserStore};
