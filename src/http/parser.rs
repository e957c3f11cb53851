use crate::http::headers::Headers;
use crate::http::request::{Method, RequestHead};
use thiserror::Error;

/// Cap on the size of a request head; anything larger is a protocol error.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unknown request method")]
    InvalidMethod,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("request head too large")]
    HeadTooLarge,
    #[error("incomplete request head")]
    Incomplete,
}

/// Parses a request head from the front of `buf`.
///
/// Returns the head and the number of bytes consumed. The consumed count
/// covers the request line and headers only; any body bytes stay in the
/// buffer for the forwarder to stream.
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize), ParseError> {
    let headers_end = match find_headers_end(buf) {
        Some(pos) => pos,
        None if buf.len() > MAX_HEAD_BYTES => return Err(ParseError::HeadTooLarge),
        None => return Err(ParseError::Incomplete),
    };

    let head_bytes = &buf[..headers_end];
    let head_str = std::str::from_utf8(head_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = head_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    // Headers, in wire order
    let mut headers = Headers::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        headers.push(key.trim(), value.trim());
    }

    let head = RequestHead {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
    };

    Ok((head, headers_end + 4))
}

pub(crate) fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_request_head(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn body_bytes_are_not_consumed() {
        let req = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";

        let (parsed, consumed) = parse_request_head(req).unwrap();

        assert_eq!(parsed.content_length(), Some(5));
        assert_eq!(consumed, req.len() - 5);
    }
}
