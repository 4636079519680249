//! The handler capability invoked for a matched route.

use crate::protocol::Request;
use crate::router::error::HandlerError;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// The value a handler resolves to.
pub type HandlerResult = Result<Value, HandlerError>;

/// A boxed handler future.
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// An asynchronous request handler.
///
/// Implemented for every `Fn(Request) -> impl Future<Output = HandlerResult>`,
/// so plain async closures can be registered directly:
///
/// ```
/// use lineroute::protocol::Request;
/// use lineroute::router::{reply, Router};
/// use serde_json::json;
///
/// let mut router = Router::new();
/// router
///     .register("GET", "/users/:id", |req: Request| async move {
///         reply(&json!({ "id": req.param("id") }))
///     })
///     .unwrap();
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Starts handling `request`.
    fn call(&self, request: Request) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: Request) -> HandlerFuture {
        Box::pin(self(request))
    }
}

/// Serializes a handler result value.
pub fn reply<T: Serialize + ?Sized>(value: &T) -> HandlerResult {
    Ok(serde_json::to_value(value)?)
}
