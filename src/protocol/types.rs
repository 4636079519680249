//! Line Protocol Data Types
//!
//! This module defines the two values that cross the wire: the decoded
//! [`Request`] and the [`Response`] written back for it.
//!
//! ## Protocol Format
//!
//! A request is one UTF-8 line of whitespace-separated tokens:
//!
//! ```text
//! VERB PATH [ARG...]
//! ```
//!
//! A response is one UTF-8 line in one of two shapes:
//!
//! ```text
//! OK <payload>
//! ERR <code> <message>
//! ```
//!
//! ## Examples
//!
//! Request: `GET /users/7`
//! Success: `OK {"id":"7","name":"ariz","email":"ariz@example.com"}`
//! Failure: `ERR ROUTE_NOT_FOUND POST /users`

use serde::Serialize;
use std::fmt;

/// Stable error codes carried by `ERR` responses.
pub mod code {
    pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
    pub const DUPLICATE_ROUTE: &str = "DUPLICATE_ROUTE";
    pub const INVALID_PATTERN: &str = "INVALID_PATTERN";
    pub const ROUTE_NOT_FOUND: &str = "ROUTE_NOT_FOUND";
    pub const HANDLER_ERROR: &str = "HANDLER_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}

/// A decoded request line.
///
/// The verb is stored upper-cased so that route lookup is case-insensitive.
/// Values bound by dynamic path segments are appended to the positional
/// arguments once the request has been matched, and can also be read by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    verb: String,
    path: String,
    args: Vec<String>,
    params: Vec<(String, String)>,
}

impl Request {
    /// Creates a request from its parts.
    pub fn new(verb: impl Into<String>, path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            verb: verb.into().to_ascii_uppercase(),
            path: path.into(),
            args,
            params: Vec::new(),
        }
    }

    /// The upper-cased verb.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// All arguments: positional tokens first, then bound path segments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Returns the value bound to the dynamic segment `:name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Named bindings in pattern order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Attaches the bindings produced by a matched route.
    pub(crate) fn bind(mut self, params: Vec<(String, String)>) -> Self {
        self.args
            .extend(params.iter().map(|(_, value)| value.clone()));
        self.params = params;
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path)?;
        for arg in &self.args[..self.args.len() - self.params.len()] {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The outcome of one request, ready to be written back to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success payload. Format: `OK <payload>`
    Ok(String),

    /// Failure with a stable code. Format: `ERR <code> <message>`
    Err { code: &'static str, message: String },
}

impl Response {
    /// Creates a success response carrying `payload` verbatim.
    pub fn ok(payload: impl Into<String>) -> Self {
        Response::Ok(single_line(payload.into()))
    }

    /// Serializes `value` as compact JSON into a success response.
    ///
    /// A value that cannot be serialized becomes a `HANDLER_ERROR` response.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(payload) => Response::ok(payload),
            Err(e) => Response::error(
                code::HANDLER_ERROR,
                format!("failed to serialize result: {}", e),
            ),
        }
    }

    /// Creates an error response.
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Response::Err {
            code,
            message: single_line(message.into()),
        }
    }

    /// Returns true if this is an `OK` response.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Returns the error code of an `ERR` response.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Response::Ok(_) => None,
            Response::Err { code, .. } => Some(code),
        }
    }

    /// Encodes the response as a single line without a terminator.
    pub fn encode(&self) -> String {
        match self {
            Response::Ok(payload) if payload.is_empty() => "OK".to_string(),
            Response::Ok(payload) => format!("OK {}", payload),
            Response::Err { code, message } if message.is_empty() => format!("ERR {}", code),
            Response::Err { code, message } => format!("ERR {} {}", code, message),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Folds line breaks into spaces so a response always occupies one line.
fn single_line(text: String) -> String {
    if text.contains(['\r', '\n']) {
        text.replace(['\r', '\n'], " ")
    } else {
        text
    }
}
