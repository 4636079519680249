//! The route table and dispatch.
//!
//! ## Lifecycle
//!
//! ```text
//! 1. Router::new()              (exclusive, &mut)
//! 2. register(...) * N          (exclusive, &mut)
//! 3. Arc::new(router)           (frozen: only &self from here on)
//! 4. prepare(raw) / handle(raw) (shared, concurrent, lock-free)
//! ```
//!
//! Registration needs `&mut Router`; serving goes through `Arc<Router>`, so a
//! route can never be added while requests are being matched.
//!
//! ## Matching
//!
//! Routes are grouped by upper-cased verb. For a given path, every route of
//! that verb is tried; among the matches the most specific pattern wins (see
//! [`Pattern::specificity_cmp`]). Ties go to the route registered first, so
//! a later route with the same shape as an earlier one (`/users/:uid` after
//! `/users/:id`) is accepted but never matches; registration logs a warning.

use crate::protocol::{parse_request, Request, Response};
use crate::router::error::{HandlerError, RouterError};
use crate::router::handler::Handler;
use crate::router::pattern::Pattern;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// One registered route.
struct Route {
    /// Registration order, used as the final tie-break
    order: usize,
    pattern: Pattern,
    handler: Arc<dyn Handler>,
}

/// The line protocol router.
///
/// # Example
///
/// ```
/// use lineroute::protocol::Request;
/// use lineroute::router::{reply, Router};
///
/// # tokio_test::block_on(async {
/// let mut router = Router::new();
/// router
///     .register("GET", "/users/:id", |req: Request| async move {
///         reply(&req.param("id"))
///     })
///     .unwrap();
///
/// let response = router.handle("GET /users/7").await;
/// assert_eq!(response.encode(), r#"OK "7""#);
/// # });
/// ```
#[derive(Default)]
pub struct Router {
    /// Routes keyed by upper-cased verb, in registration order
    routes: HashMap<String, Vec<Route>>,

    /// Total number of registered routes
    count: usize,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    ///
    /// Fails with [`RouterError::DuplicateRoute`] when `(verb, pattern)` is
    /// already registered (verb compared case-insensitively), and with
    /// [`RouterError::InvalidPattern`] when the verb or pattern is unusable.
    /// The table is left untouched on failure.
    pub fn register<H: Handler>(
        &mut self,
        verb: &str,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouterError> {
        if verb.is_empty() || verb.chars().any(char::is_whitespace) {
            return Err(RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "verb must be a single non-empty token",
            });
        }
        let pattern = Pattern::parse(pattern)?;
        let verb = verb.to_ascii_uppercase();

        let routes = self.routes.entry(verb.clone()).or_default();
        if routes.iter().any(|r| r.pattern.as_str() == pattern.as_str()) {
            return Err(RouterError::DuplicateRoute {
                verb,
                pattern: pattern.as_str().to_string(),
            });
        }

        if let Some(earlier) = routes.iter().find(|r| r.pattern.same_shape(&pattern)) {
            warn!(
                verb = %verb,
                pattern = %pattern.as_str(),
                shadowed_by = %earlier.pattern.as_str(),
                "Route is shadowed by an equally specific earlier route and will never match"
            );
        }

        debug!(verb = %verb, pattern = %pattern.as_str(), "Registered route");
        routes.push(Route {
            order: self.count,
            pattern,
            handler: Arc::new(handler),
        });
        self.count += 1;
        Ok(())
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no route is registered.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Lists `(verb, pattern)` pairs in registration order.
    pub fn routes(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<(usize, &str, &str)> = self
            .routes
            .iter()
            .flat_map(|(verb, routes)| {
                routes
                    .iter()
                    .map(move |r| (r.order, verb.as_str(), r.pattern.as_str()))
            })
            .collect();
        all.sort_by_key(|(order, _, _)| *order);
        all.into_iter().map(|(_, verb, pattern)| (verb, pattern)).collect()
    }

    /// Parses and matches one raw message.
    ///
    /// Parse and match failures are returned synchronously; the handler has
    /// not been invoked yet when this returns.
    pub fn prepare(&self, raw: &str) -> Result<Dispatch, RouterError> {
        let request = parse_request(raw)?;
        self.resolve(request)
    }

    /// Matches an already decoded request.
    pub fn resolve(&self, request: Request) -> Result<Dispatch, RouterError> {
        let not_found = || RouterError::RouteNotFound {
            verb: request.verb().to_string(),
            path: request.path().to_string(),
        };

        let routes = self.routes.get(request.verb()).ok_or_else(not_found)?;

        let (route, params) = routes
            .iter()
            .filter_map(|route| route.pattern.matches(request.path()).map(|p| (route, p)))
            .min_by(|(a, _), (b, _)| {
                b.pattern
                    .specificity_cmp(&a.pattern)
                    .then(a.order.cmp(&b.order))
            })
            .ok_or_else(not_found)?;

        trace!(
            verb = %request.verb(),
            path = %request.path(),
            pattern = %route.pattern.as_str(),
            "Matched route"
        );

        Ok(Dispatch {
            pattern: route.pattern.as_str().to_string(),
            request: request.bind(params),
            handler: Arc::clone(&route.handler),
        })
    }

    /// Routes one raw message and waits for its response.
    ///
    /// Never fails: every outcome is normalized into a [`Response`].
    pub async fn handle(&self, raw: &str) -> Response {
        match self.prepare(raw) {
            Ok(dispatch) => dispatch.run().await,
            Err(err) => err.to_response(),
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes())
            .finish()
    }
}

/// A matched request, ready to run.
pub struct Dispatch {
    pattern: String,
    request: Request,
    handler: Arc<dyn Handler>,
}

impl Dispatch {
    /// The request with its dynamic bindings attached.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The pattern of the matched route.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Invokes the handler and normalizes the outcome.
    ///
    /// A handler that returns an error or panics yields an `ERR` response;
    /// nothing escapes this boundary.
    pub async fn run(self) -> Response {
        let Dispatch {
            pattern,
            request,
            handler,
        } = self;
        let verb = request.verb().to_string();
        let path = request.path().to_string();

        let outcome = AssertUnwindSafe(async move { handler.call(request).await })
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(value)) => Response::json(&value),
            Ok(Err(err)) => RouterError::Handler(err).to_response(),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                RouterError::Handler(HandlerError::Aborted(reason)).to_response()
            }
        };

        debug!(
            verb = %verb,
            path = %path,
            pattern = %pattern,
            code = response.code().unwrap_or("OK"),
            "Dispatched request"
        );
        response
    }
}
