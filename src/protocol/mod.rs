//! Line Protocol Implementation
//!
//! This module implements the text protocol spoken over each connection.
//!
//! ## Overview
//!
//! Every message is one UTF-8 line. Requests look like `VERB PATH [ARG...]`;
//! responses look like `OK <payload>` or `ERR <code> <message>`.
//!
//! ## Modules
//!
//! - `types`: Defines `Request`, `Response` and the stable error codes
//! - `parser`: Line framing and request-line decoding
//!
//! ## Example
//!
//! ```
//! use lineroute::protocol::{parse_request, Response};
//!
//! let request = parse_request("get /users/7").unwrap();
//! assert_eq!(request.verb(), "GET");
//!
//! let response = Response::ok("PONG");
//! assert_eq!(response.encode(), "OK PONG");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, parse_request_bytes, LineParser, ParseError, ParseResult};
pub use types::{code, Request, Response};
