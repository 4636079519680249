//! Per-Connection Sessions
//!
//! A [`Session`] is the router's view of one connection. It is the entry
//! point for every inbound message on that connection and guarantees that
//! responses leave in the same order their requests arrived, even when the
//! handlers finish out of order.
//!
//! ## Ordering
//!
//! ```text
//! handle(R1) ──┐                         ┌──> send(resp R1)
//! handle(R2) ──┼──> FIFO of pending ──>──┼──> send(resp R2)
//! handle(R3) ──┘    responses            └──> send(resp R3)
//!                   (delivery task)
//! ```
//!
//! Each matched request runs on its own Tokio task, so a slow handler never
//! stops the connection from accepting the next message. The delivery task
//! awaits the pending entries strictly in submission order; a fast R2 waits
//! in the queue until R1 has been written.
//!
//! The queue is bounded. Once [`MAX_PENDING`] responses are waiting, `handle`
//! does not return until the oldest one has been delivered, which stops the
//! transport from reading further requests off that connection.
//!
//! ## Dead Connections
//!
//! Before every write the delivery task checks [`Connection::is_open`]. A
//! response whose connection has gone away, or whose write fails, is counted
//! as discarded. The handler that produced it is not cancelled.

use crate::connection::stats::ConnectionStats;
use crate::protocol::{parse_request_bytes, Response};
use crate::router::{Dispatch, HandlerError, Router, RouterError};
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default number of responses a session queues before `handle` waits.
pub const MAX_PENDING: usize = 128;

/// The outbound side of a connection, as seen by the router.
///
/// Opening, closing and framing belong to the transport.
pub trait Connection: Send + Sync + 'static {
    /// Opaque session token, used for logging.
    fn id(&self) -> &str;

    /// Returns false once the transport has closed the connection.
    fn is_open(&self) -> bool;

    /// Writes one encoded response.
    ///
    /// Resolves to `Ok` only once the transport has accepted the bytes for
    /// the peer; a failed write resolves to `Err`.
    fn send(&self, text: String) -> BoxFuture<'_, Result<(), SendError>>;
}

/// The connection could not accept a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("connection {0} is closed")]
pub struct SendError(pub String);

/// A response slot in the delivery queue.
enum Pending {
    /// Resolved synchronously (parse or match failure)
    Ready(Response),
    /// Handler running on its own task
    Running(JoinHandle<Response>),
}

/// Request handling state for one connection.
///
/// Dropping the session stops intake; responses already queued are still
/// delivered, after which the delivery task ends.
pub struct Session<C: Connection> {
    router: Arc<Router>,
    connection: Arc<C>,
    queue: mpsc::Sender<Pending>,
    stats: Arc<ConnectionStats>,
}

impl<C: Connection> Session<C> {
    /// Opens a session and spawns its delivery task.
    ///
    /// The returned handle completes once the session has been dropped and
    /// every queued response has been delivered or discarded.
    pub fn open(
        router: Arc<Router>,
        connection: Arc<C>,
        stats: Arc<ConnectionStats>,
    ) -> (Self, JoinHandle<()>) {
        Self::with_limit(router, connection, stats, MAX_PENDING)
    }

    /// Like [`Session::open`], queueing at most `limit` responses.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn with_limit(
        router: Arc<Router>,
        connection: Arc<C>,
        stats: Arc<ConnectionStats>,
        limit: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, pending) = mpsc::channel(limit);
        let delivery = tokio::spawn(deliver(
            Arc::clone(&connection),
            pending,
            Arc::clone(&stats),
        ));

        let session = Self {
            router,
            connection,
            queue,
            stats,
        };
        (session, delivery)
    }

    /// The connection this session writes to.
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Handles one inbound text message.
    ///
    /// Exactly one response is queued for every call. Parse and match
    /// failures are also returned to the caller; `Ok` means a handler was
    /// dispatched. Waits while the queue is full.
    pub async fn handle(&self, raw: &str) -> Result<(), RouterError> {
        self.stats.request_processed();
        let outcome = self.router.prepare(raw);
        self.submit(outcome).await
    }

    /// Handles one inbound message that has not been decoded as UTF-8 yet.
    pub async fn handle_bytes(&self, raw: &[u8]) -> Result<(), RouterError> {
        self.stats.request_processed();
        let outcome = parse_request_bytes(raw)
            .map_err(RouterError::from)
            .and_then(|request| self.router.resolve(request));
        self.submit(outcome).await
    }

    async fn submit(&self, outcome: Result<Dispatch, RouterError>) -> Result<(), RouterError> {
        // Take the slot first so no handler starts while the queue is full.
        let slot = self.queue.reserve().await.ok();

        let (pending, result) = match outcome {
            Ok(dispatch) => {
                trace!(
                    connection = %self.connection.id(),
                    request = %dispatch.request(),
                    "Dispatching"
                );
                (Pending::Running(tokio::spawn(dispatch.run())), Ok(()))
            }
            Err(err) => {
                debug!(
                    connection = %self.connection.id(),
                    code = err.code(),
                    error = %err,
                    "Rejected request"
                );
                (Pending::Ready(err.to_response()), Err(err))
            }
        };

        match slot {
            Some(slot) => slot.send(pending),
            // The delivery task only exits after every sender is gone.
            None => self.stats.response_discarded(),
        }
        result
    }
}

/// Writes responses in submission order until the session is dropped.
async fn deliver<C: Connection>(
    connection: Arc<C>,
    mut pending: mpsc::Receiver<Pending>,
    stats: Arc<ConnectionStats>,
) {
    while let Some(entry) = pending.recv().await {
        let response = match entry {
            Pending::Ready(response) => response,
            Pending::Running(task) => match task.await {
                Ok(response) => response,
                Err(e) => RouterError::Handler(HandlerError::Aborted(e.to_string())).to_response(),
            },
        };

        if !connection.is_open() {
            stats.response_discarded();
            debug!(
                connection = %connection.id(),
                "Connection closed, discarding response"
            );
            continue;
        }

        match connection.send(response.encode()).await {
            Ok(()) => stats.response_sent(),
            Err(e) => {
                stats.response_discarded();
                debug!(connection = %connection.id(), error = %e, "Discarding response");
            }
        }
    }

    trace!(connection = %connection.id(), "Delivery finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Request;
    use crate::router::reply;
    use futures::future::{self, FutureExt};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records everything sent to it.
    struct RecordingConnection {
        open: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    impl Connection for RecordingConnection {
        fn id(&self) -> &str {
            "test"
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send(&self, text: String) -> BoxFuture<'_, Result<(), SendError>> {
            let result = if self.is_open() {
                self.sent.lock().unwrap().push(text);
                Ok(())
            } else {
                Err(SendError("test".into()))
            };
            future::ready(result).boxed()
        }
    }

    /// `GET /slow` waits for `gate`; `GET /fast` answers immediately.
    fn gated_router(gate: Arc<Notify>) -> Arc<Router> {
        let mut router = Router::new();
        router
            .register("GET", "/slow", move |_req: Request| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    reply("slow")
                }
            })
            .unwrap();
        router
            .register("GET", "/fast", |_req: Request| async { reply("fast") })
            .unwrap();
        Arc::new(router)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_responses_keep_request_order() {
        let gate = Arc::new(Notify::new());
        let connection = RecordingConnection::new();
        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) =
            Session::open(gated_router(Arc::clone(&gate)), Arc::clone(&connection), stats);

        session.handle("GET /slow").await.unwrap();
        session.handle("GET /fast").await.unwrap();
        settle().await;

        // The fast response is ready but must wait behind the slow one.
        assert!(connection.sent().is_empty());

        gate.notify_one();
        drop(session);
        delivery.await.unwrap();

        assert_eq!(connection.sent(), vec![r#"OK "slow""#, r#"OK "fast""#]);
    }

    #[tokio::test]
    async fn test_sync_errors_are_ordered_too() {
        let gate = Arc::new(Notify::new());
        let connection = RecordingConnection::new();
        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) =
            Session::open(gated_router(Arc::clone(&gate)), Arc::clone(&connection), stats);

        session.handle("GET /slow").await.unwrap();
        let err = session.handle("GET").await.unwrap_err();
        assert!(matches!(err, RouterError::MalformedRequest(_)));
        let err = session.handle("POST /users").await.unwrap_err();
        assert!(matches!(err, RouterError::RouteNotFound { .. }));

        gate.notify_one();
        drop(session);
        delivery.await.unwrap();

        let sent = connection.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], r#"OK "slow""#);
        assert!(sent[1].starts_with("ERR MALFORMED_REQUEST"));
        assert_eq!(sent[2], "ERR ROUTE_NOT_FOUND POST /users");
    }

    #[tokio::test]
    async fn test_closed_connection_discards_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let connection = RecordingConnection::new();
        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) = Session::open(
            gated_router(Arc::clone(&gate)),
            Arc::clone(&connection),
            Arc::clone(&stats),
        );

        session.handle("GET /slow").await.unwrap();
        settle().await;
        connection.close();
        gate.notify_one();

        drop(session);
        delivery.await.unwrap();

        assert!(connection.sent().is_empty());
        assert_eq!(stats.responses_discarded.load(Ordering::Relaxed), 1);
        assert_eq!(stats.responses_sent.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_panicking_handler_keeps_session_alive() {
        let mut router = Router::new();
        router
            .register("GET", "/boom", |_req: Request| async {
                if true {
                    panic!("kaboom");
                }
                reply("unreachable")
            })
            .unwrap();
        router
            .register("GET", "/users/:id", |req: Request| async move {
                reply(&json!({ "id": req.param("id") }))
            })
            .unwrap();

        let connection = RecordingConnection::new();
        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) =
            Session::open(Arc::new(router), Arc::clone(&connection), Arc::clone(&stats));

        session.handle("GET /boom").await.unwrap();
        session.handle("GET /users/1").await.unwrap();
        drop(session);
        delivery.await.unwrap();

        assert_eq!(
            connection.sent(),
            vec![
                "ERR HANDLER_ERROR handler aborted: kaboom".to_string(),
                r#"OK {"id":"1"}"#.to_string(),
            ]
        );
        assert_eq!(stats.requests_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.responses_sent.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed() {
        let connection = RecordingConnection::new();
        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) =
            Session::open(Arc::new(Router::new()), Arc::clone(&connection), stats);

        let err = session.handle_bytes(b"GET /\xff\xfe").await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_REQUEST");
        drop(session);
        delivery.await.unwrap();

        assert_eq!(connection.sent().len(), 1);
        assert!(connection.sent()[0].starts_with("ERR MALFORMED_REQUEST invalid UTF-8"));
    }

    #[tokio::test]
    async fn test_full_queue_holds_back_intake() {
        let gate = Arc::new(Notify::new());
        let connection = RecordingConnection::new();
        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) = Session::with_limit(
            gated_router(Arc::clone(&gate)),
            Arc::clone(&connection),
            stats,
            1,
        );

        // The delivery task picks up /slow and blocks on it; /fast fills the
        // single queue slot.
        session.handle("GET /slow").await.unwrap();
        settle().await;
        session.handle("GET /fast").await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), session.handle("GET /fast")).await;
        assert!(blocked.is_err(), "a full queue must not accept more work");

        gate.notify_one();
        session.handle("GET /fast").await.unwrap();
        drop(session);
        delivery.await.unwrap();

        assert_eq!(
            connection.sent(),
            vec![r#"OK "slow""#, r#"OK "fast""#, r#"OK "fast""#]
        );
    }

    #[tokio::test]
    async fn test_failed_send_counts_as_discarded() {
        struct BrokenConnection;

        impl Connection for BrokenConnection {
            fn id(&self) -> &str {
                "broken"
            }
            fn is_open(&self) -> bool {
                true
            }
            fn send(&self, _text: String) -> BoxFuture<'_, Result<(), SendError>> {
                future::ready(Err(SendError("broken".into()))).boxed()
            }
        }

        let stats = Arc::new(ConnectionStats::new());
        let (session, delivery) = Session::open(
            gated_router(Arc::new(Notify::new())),
            Arc::new(BrokenConnection),
            Arc::clone(&stats),
        );

        session.handle("GET /fast").await.unwrap();
        session.handle("GET").await.unwrap_err();
        drop(session);
        delivery.await.unwrap();

        assert_eq!(stats.responses_sent.load(Ordering::Relaxed), 0);
        assert_eq!(stats.responses_discarded.load(Ordering::Relaxed), 2);
    }
}
