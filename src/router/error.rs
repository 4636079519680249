//! Router and handler errors.
//!
//! Every error that can reach a client carries a stable code (see
//! [`crate::protocol::code`]) and converts into an `ERR` [`Response`].

use crate::protocol::{code, ParseError, Response};
use thiserror::Error;

/// Failures surfaced by a dispatched handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// The request arguments were missing or unusable
    #[error("{0}")]
    InvalidArgument(String),

    /// A downstream collaborator (e.g. the data store) is unavailable
    #[error("{0}")]
    Unavailable(String),

    /// Any other failure
    #[error("{0}")]
    Failed(String),

    /// The handler panicked or its task was torn down before completing
    #[error("handler aborted: {0}")]
    Aborted(String),
}

impl HandlerError {
    /// Returns the stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::NotFound(_) => code::NOT_FOUND,
            HandlerError::InvalidArgument(_) => code::INVALID_ARGUMENT,
            HandlerError::Unavailable(_) => code::UNAVAILABLE,
            HandlerError::Failed(_) | HandlerError::Aborted(_) => code::HANDLER_ERROR,
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Failed(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Failed(format!("failed to serialize result: {}", err))
    }
}

/// Errors produced while registering routes or routing a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The request line could not be decoded
    #[error(transparent)]
    MalformedRequest(#[from] ParseError),

    /// `(verb, pattern)` is already in the table
    #[error("route already registered: {verb} {pattern}")]
    DuplicateRoute { verb: String, pattern: String },

    /// The verb or pattern given to `register` is unusable
    #[error("invalid route {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// No registered route matches the verb and path
    #[error("{verb} {path}")]
    RouteNotFound { verb: String, path: String },

    /// The matched handler failed
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl RouterError {
    /// Returns the stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::MalformedRequest(_) => code::MALFORMED_REQUEST,
            RouterError::DuplicateRoute { .. } => code::DUPLICATE_ROUTE,
            RouterError::InvalidPattern { .. } => code::INVALID_PATTERN,
            RouterError::RouteNotFound { .. } => code::ROUTE_NOT_FOUND,
            RouterError::Handler(err) => err.code(),
        }
    }

    /// Converts the error into the `ERR` response sent to the client.
    pub fn to_response(&self) -> Response {
        Response::error(self.code(), self.to_string())
    }
}

impl From<RouterError> for Response {
    fn from(err: RouterError) -> Self {
        err.to_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_response() {
        let err = RouterError::RouteNotFound {
            verb: "POST".into(),
            path: "/users".into(),
        };
        assert_eq!(err.to_response().encode(), "ERR ROUTE_NOT_FOUND POST /users");
    }

    #[test]
    fn test_malformed_response() {
        let err = RouterError::from(ParseError::TooFewTokens { found: 1 });
        let encoded = err.to_response().encode();
        assert!(encoded.starts_with("ERR MALFORMED_REQUEST "));
    }

    #[test]
    fn test_handler_codes() {
        let cases = [
            (HandlerError::NotFound("x".into()), "ERR NOT_FOUND x"),
            (HandlerError::InvalidArgument("x".into()), "ERR INVALID_ARGUMENT x"),
            (HandlerError::Unavailable("x".into()), "ERR UNAVAILABLE x"),
            (HandlerError::Failed("x".into()), "ERR HANDLER_ERROR x"),
            (
                HandlerError::Aborted("boom".into()),
                "ERR HANDLER_ERROR handler aborted: boom",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(RouterError::from(err).to_response().encode(), expected);
        }
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: HandlerError = anyhow::anyhow!("connection refused")
            .context("store query failed")
            .into();
        assert_eq!(
            err,
            HandlerError::Failed("store query failed: connection refused".into())
        );
    }
}
