//! Request Line Parser
//!
//! This module turns raw inbound text into [`Request`] values. It has two
//! layers:
//!
//! 1. **Framing** ([`LineParser`]): finds one complete `\n`-terminated line in
//!    a byte buffer. Returns `Ok(None)` while the line is still incomplete so
//!    the caller can read more data and try again.
//! 2. **Decoding** ([`parse_request`]): splits one line on whitespace into a
//!    verb, a path and positional arguments.
//!
//! ## How the Framing Works
//!
//! - `Ok(Some((line, consumed)))` - a whole line is available; advance the
//!   buffer by `consumed` bytes (the line plus its terminator)
//! - `Ok(None)` - need more data
//! - `Err(ParseError)` - the pending line exceeds the size limit
//!
//! The parser remembers how much of an incomplete line it has already
//! searched, so a line arriving in many small reads is scanned once. Keep
//! passing the same (growing) buffer until a line comes back.

use crate::protocol::types::Request;
use thiserror::Error;

/// Errors that can occur while decoding a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A verb and a path are both mandatory
    #[error("expected \"VERB PATH [ARG...]\", got {found} token(s)")]
    TooFewTokens { found: usize },

    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The line exceeds the maximum allowed size
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single request line (64 KB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Splits a byte stream into request lines.
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line: usize,
    /// Bytes at the front of the buffer already known to contain no `\n`
    scanned: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line size limit.
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_SIZE)
    }

    /// Creates a parser with a custom line size limit.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            max_line,
            scanned: 0,
        }
    }

    /// Attempts to take one line from the front of `buf`.
    ///
    /// The returned slice excludes the `\n` terminator and an optional `\r`
    /// before it.
    pub fn next_line<'a>(&mut self, buf: &'a [u8]) -> ParseResult<Option<(&'a [u8], usize)>> {
        let start = self.scanned.min(buf.len());
        let found = find_lf(&buf[start..]).map(|pos| start + pos);
        self.scanned = if found.is_some() { 0 } else { buf.len() };

        match found {
            Some(pos) if pos > self.max_line => Err(self.too_long(pos)),
            Some(pos) => {
                let line = &buf[..pos];
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                Ok(Some((line, pos + 1)))
            }
            None if buf.len() > self.max_line => Err(self.too_long(buf.len())),
            None => Ok(None),
        }
    }

    fn too_long(&mut self, size: usize) -> ParseError {
        self.scanned = 0;
        ParseError::LineTooLong {
            size,
            max: self.max_line,
        }
    }
}

/// Finds the position of the first `\n` in the buffer.
#[inline]
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Decodes one request line.
///
/// The first token is the verb, the second the path, and any remaining tokens
/// become positional arguments in order. Tokens are separated by any run of
/// whitespace.
pub fn parse_request(line: &str) -> ParseResult<Request> {
    let mut tokens = line.split_whitespace();

    let (verb, path) = match (tokens.next(), tokens.next()) {
        (Some(verb), Some(path)) => (verb, path),
        (Some(_), None) => return Err(ParseError::TooFewTokens { found: 1 }),
        _ => return Err(ParseError::TooFewTokens { found: 0 }),
    };

    let args = tokens.map(str::to_string).collect();
    Ok(Request::new(verb, path, args))
}

/// Decodes one request line from raw bytes.
pub fn parse_request_bytes(line: &[u8]) -> ParseResult<Request> {
    let line = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    parse_request(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verb_and_path() {
        let request = parse_request("GET /users").unwrap();
        assert_eq!(request.verb(), "GET");
        assert_eq!(request.path(), "/users");
        assert!(request.args().is_empty());
    }

    #[test]
    fn test_parse_positional_args() {
        let request = parse_request("POST /users ariz ariz@example.com").unwrap();
        assert_eq!(request.args(), ["ariz", "ariz@example.com"]);
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let request = parse_request("  delete \t/users/3   now ").unwrap();
        assert_eq!(request.verb(), "DELETE");
        assert_eq!(request.path(), "/users/3");
        assert_eq!(request.args(), ["now"]);
    }

    #[test]
    fn test_parse_single_token() {
        assert_eq!(
            parse_request("GET"),
            Err(ParseError::TooFewTokens { found: 1 })
        );
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_request(""), Err(ParseError::TooFewTokens { found: 0 }));
        assert_eq!(
            parse_request("   "),
            Err(ParseError::TooFewTokens { found: 0 })
        );
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let result = parse_request_bytes(b"GET /\xff");
        assert!(matches!(result, Err(ParseError::InvalidUtf8(_))));
    }

    #[test]
    fn test_next_line_complete() {
        let mut parser = LineParser::new();
        let (line, consumed) = parser.next_line(b"GET /users\nGET").unwrap().unwrap();
        assert_eq!(line, b"GET /users");
        assert_eq!(consumed, 11);
    }

    #[test]
    fn test_next_line_strips_cr() {
        let mut parser = LineParser::new();
        let (line, consumed) = parser.next_line(b"GET /users\r\n").unwrap().unwrap();
        assert_eq!(line, b"GET /users");
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_next_line_incomplete() {
        let mut parser = LineParser::new();
        assert!(parser.next_line(b"GET /us").unwrap().is_none());
        assert!(parser.next_line(b"").unwrap().is_none());
    }

    #[test]
    fn test_next_line_too_long() {
        let mut parser = LineParser::with_max_line(8);
        assert!(matches!(
            parser.next_line(b"GET /users/12345"),
            Err(ParseError::LineTooLong { max: 8, .. })
        ));
        assert!(matches!(
            parser.next_line(b"GET /users/12345\n"),
            Err(ParseError::LineTooLong { size: 16, .. })
        ));
    }

    #[test]
    fn test_next_line_resumes_after_partial_reads() {
        let mut parser = LineParser::new();
        let mut buf = b"GET /us".to_vec();
        assert!(parser.next_line(&buf).unwrap().is_none());

        buf.extend_from_slice(b"ers/7");
        assert!(parser.next_line(&buf).unwrap().is_none());

        buf.extend_from_slice(b"\r\nGET /users\n");
        let (line, consumed) = parser.next_line(&buf).unwrap().unwrap();
        assert_eq!(line, b"GET /users/7");
        assert_eq!(consumed, 14);

        // After a line is returned the next search starts from the front.
        let (line, _) = parser.next_line(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(line, b"GET /users");
    }
}
