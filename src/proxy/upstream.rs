//! Upstream connection and request forwarding.
//!
//! This module performs the outbound call for a matched request: it opens
//! the upstream connection, rewrites the request head for the next hop, and
//! relays both bodies as bounded-size chunks. Memory use never scales with
//! payload size.

use crate::http::headers::Headers;
use crate::http::parser::find_headers_end;
use crate::http::request::{Method, RequestHead};
use bytes::{Buf, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

/// Relay chunk size.
const BUFFER_SIZE: usize = 8192;

/// Cap on the size of an upstream response head.
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Headers that belong to a single hop and are regenerated rather than
/// relayed. Transfer-Encoding is intentionally absent: bodies are relayed
/// with their original framing.
const HOP_BY_HOP: [&str; 8] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "TE",
    "Trailer",
    "Upgrade",
];

/// A single forwarding attempt gone wrong.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("connect to {0} failed: {1}")]
    ConnectFailed(String, #[source] std::io::Error),

    #[error("timed out waiting on {0}")]
    Timeout(&'static str),

    #[error("stream aborted: {0}")]
    StreamAborted(String),
}

/// An `UpstreamError` plus where in the exchange it happened.
///
/// Once `response_started` is set, bytes of the relayed response have
/// reached the client and no error response may follow them; the caller
/// must drop the connection instead.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ForwardError {
    pub error: UpstreamError,
    pub response_started: bool,
}

impl ForwardError {
    fn before(error: UpstreamError) -> Self {
        Self {
            error,
            response_started: false,
        }
    }

    fn after(error: UpstreamError) -> Self {
        Self {
            error,
            response_started: true,
        }
    }
}

/// How a message body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    None,
    Length(u64),
    Chunked,
    UntilEof,
}

/// Result of a completed relay.
#[derive(Debug, Clone, Copy)]
pub struct RelayOutcome {
    /// Upstream status code, as relayed to the client.
    pub status: u16,

    /// Whether the client connection may serve another request.
    pub reusable: bool,
}

/// The head of an upstream response, parsed only far enough to relay it
/// and pick the body framing.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

/// Performs single-attempt request forwarding with streaming relay.
#[derive(Debug, Clone, Copy)]
pub struct Forwarder {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Forwarder {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    /// Forwards one request to `target` and relays the response.
    ///
    /// `client_buf` holds whatever was read past the request head; request
    /// body bytes are taken from it before the client socket. No retry: one
    /// inbound request gets exactly one upstream attempt.
    pub async fn forward(
        &self,
        client: &mut TcpStream,
        client_buf: &mut BytesMut,
        head: &RequestHead,
        target: &Url,
    ) -> Result<RelayOutcome, ForwardError> {
        let host = target.host_str().ok_or_else(|| {
            ForwardError::before(UpstreamError::StreamAborted(
                "target URL has no host".to_string(),
            ))
        })?;
        let port = target.port().unwrap_or(80);
        let addr = format!("{host}:{port}");

        let mut upstream = match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Err(_) => return Err(ForwardError::before(UpstreamError::Timeout("connect"))),
            Ok(Err(e)) => {
                return Err(ForwardError::before(UpstreamError::ConnectFailed(addr, e)));
            }
            Ok(Ok(stream)) => stream,
        };

        tracing::trace!(addr = %addr, "connected to upstream");

        // Outbound request head, then the inbound body in its original
        // framing.
        let head_bytes = build_request_head(head, target);
        upstream
            .write_all(&head_bytes)
            .await
            .map_err(|e| ForwardError::before(write_aborted("request head", e)))?;

        match request_body_framing(head) {
            BodyFraming::None | BodyFraming::UntilEof => {}
            BodyFraming::Length(n) => {
                relay_exact(client_buf, client, &mut upstream, n, self.read_timeout, "request body")
                    .await
                    .map_err(ForwardError::before)?;
            }
            BodyFraming::Chunked => {
                relay_chunked(client_buf, client, &mut upstream, self.read_timeout, "request body")
                    .await
                    .map_err(ForwardError::before)?;
            }
        }

        upstream
            .flush()
            .await
            .map_err(|e| ForwardError::before(write_aborted("request body", e)))?;

        // Upstream response head
        let mut upstream_buf = BytesMut::with_capacity(BUFFER_SIZE);
        let head_end = read_head_bytes(&mut upstream, &mut upstream_buf, self.read_timeout)
            .await
            .map_err(ForwardError::before)?;
        let response = parse_response_head(&upstream_buf[..head_end]).map_err(ForwardError::before)?;
        upstream_buf.advance(head_end + 4);

        let framing = response_body_framing(&head.method, response.status, &response.headers);
        let reusable = framing != BodyFraming::UntilEof && head.keep_alive();

        let response_bytes = serialize_response_head(&response, reusable);
        client
            .write_all(&response_bytes)
            .await
            .map_err(|e| ForwardError::after(write_aborted("response head", e)))?;

        match framing {
            BodyFraming::None => {}
            BodyFraming::Length(n) => {
                relay_exact(
                    &mut upstream_buf,
                    &mut upstream,
                    client,
                    n,
                    self.read_timeout,
                    "response body",
                )
                .await
                .map_err(ForwardError::after)?;
            }
            BodyFraming::Chunked => {
                relay_chunked(
                    &mut upstream_buf,
                    &mut upstream,
                    client,
                    self.read_timeout,
                    "response body",
                )
                .await
                .map_err(ForwardError::after)?;
            }
            BodyFraming::UntilEof => {
                relay_until_eof(&mut upstream_buf, &mut upstream, client, self.read_timeout)
                    .await
                    .map_err(ForwardError::after)?;
            }
        }

        client
            .flush()
            .await
            .map_err(|e| ForwardError::after(write_aborted("response body", e)))?;

        tracing::debug!(status = response.status, reusable, "relay complete");

        Ok(RelayOutcome {
            status: response.status,
            reusable,
        })
    }
}

/// Builds the outbound request head: same method, path and query from the
/// resolved target, all headers relayed except the hop-by-hop set, Host
/// rewritten to the upstream authority.
pub fn build_request_head(head: &RequestHead, target: &Url) -> Vec<u8> {
    let mut path = target.path().to_string();
    if path.is_empty() {
        path.push('/');
    }
    if let Some(q) = target.query() {
        path.push('?');
        path.push_str(q);
    }

    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(
        format!("{} {} {}\r\n", head.method.as_str(), path, head.version).as_bytes(),
    );

    let mut headers = head.headers.clone();
    headers.set("Host", host_header(target));
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    // Upstream connections are one-shot.
    headers.push("Connection", "close");

    for (key, value) in headers.iter() {
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}

/// Parses an upstream response head (status line and headers).
pub fn parse_response_head(bytes: &[u8]) -> Result<ResponseHead, UpstreamError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| UpstreamError::StreamAborted("response head is not UTF-8".to_string()))?;

    let mut lines = text.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| UpstreamError::StreamAborted("empty response head".to_string()))?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts
        .next()
        .ok_or_else(|| invalid_status_line(status_line))?;
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| invalid_status_line(status_line))?;
    let reason = parts.next().unwrap_or("");

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| UpstreamError::StreamAborted(format!("malformed header {line:?}")))?;

        headers.push(key.trim(), value.trim());
    }

    Ok(ResponseHead {
        version: version.to_string(),
        status,
        reason: reason.to_string(),
        headers,
    })
}

/// Serializes a response head for the client hop: original status line and
/// headers, minus the hop-by-hop set, plus this hop's Connection header.
pub fn serialize_response_head(head: &ResponseHead, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    if head.reason.is_empty() {
        buf.extend_from_slice(format!("{} {}\r\n", head.version, head.status).as_bytes());
    } else {
        buf.extend_from_slice(
            format!("{} {} {}\r\n", head.version, head.status, head.reason).as_bytes(),
        );
    }

    let mut headers = head.headers.clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.push(
        "Connection",
        if keep_alive { "keep-alive" } else { "close" },
    );

    for (key, value) in headers.iter() {
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}

fn invalid_status_line(line: &str) -> UpstreamError {
    UpstreamError::StreamAborted(format!("invalid status line {line:?}"))
}

fn host_header(target: &Url) -> String {
    match (target.host_str(), target.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

fn request_body_framing(head: &RequestHead) -> BodyFraming {
    if head.is_chunked() {
        return BodyFraming::Chunked;
    }

    match head.content_length() {
        Some(n) if n > 0 => BodyFraming::Length(n),
        _ => BodyFraming::None,
    }
}

fn response_body_framing(method: &Method, status: u16, headers: &Headers) -> BodyFraming {
    // Bodiless by definition, whatever the headers claim.
    if *method == Method::HEAD || status / 100 == 1 || status == 204 || status == 304 {
        return BodyFraming::None;
    }

    let chunked = headers
        .get("Transfer-Encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);
    if chunked {
        return BodyFraming::Chunked;
    }

    match headers.get("Content-Length").and_then(|v| v.parse::<u64>().ok()) {
        Some(0) => BodyFraming::None,
        Some(n) => BodyFraming::Length(n),
        None => BodyFraming::UntilEof,
    }
}

fn write_aborted(phase: &str, e: std::io::Error) -> UpstreamError {
    UpstreamError::StreamAborted(format!("{phase}: write failed: {e}"))
}

/// One bounded read into `buf`, with the idle-read timeout applied.
async fn timed_read(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    dur: Duration,
    phase: &'static str,
) -> Result<usize, UpstreamError> {
    buf.reserve(BUFFER_SIZE);

    match timeout(dur, stream.read_buf(buf)).await {
        Err(_) => Err(UpstreamError::Timeout(phase)),
        Ok(Err(e)) => Err(UpstreamError::StreamAborted(format!(
            "{phase}: read failed: {e}"
        ))),
        Ok(Ok(n)) => Ok(n),
    }
}

/// Reads until a complete head (terminated by a blank line) is buffered.
/// Returns the offset of the terminator.
async fn read_head_bytes(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    read_timeout: Duration,
) -> Result<usize, UpstreamError> {
    loop {
        if let Some(end) = find_headers_end(buf) {
            return Ok(end);
        }

        if buf.len() > MAX_HEAD_BYTES {
            return Err(UpstreamError::StreamAborted(
                "response head too large".to_string(),
            ));
        }

        let n = timed_read(stream, buf, read_timeout, "response head").await?;
        if n == 0 {
            return Err(UpstreamError::StreamAborted(
                "connection closed before response head".to_string(),
            ));
        }
    }
}

/// Relays exactly `remaining` bytes from `src` (buffer first) to `dst`.
async fn relay_exact(
    buf: &mut BytesMut,
    src: &mut TcpStream,
    dst: &mut TcpStream,
    mut remaining: u64,
    read_timeout: Duration,
    phase: &'static str,
) -> Result<(), UpstreamError> {
    while remaining > 0 {
        if buf.is_empty() {
            let n = timed_read(src, buf, read_timeout, phase).await?;
            if n == 0 {
                return Err(UpstreamError::StreamAborted(format!(
                    "{phase}: connection closed with {remaining} bytes left"
                )));
            }
        }

        let take = (buf.len() as u64).min(remaining) as usize;
        dst.write_all(&buf[..take])
            .await
            .map_err(|e| write_aborted(phase, e))?;
        buf.advance(take);
        remaining -= take as u64;
    }

    Ok(())
}

/// Relays a chunked body verbatim. The framing is scanned only to find the
/// terminal chunk; chunk data passes through untouched.
async fn relay_chunked(
    buf: &mut BytesMut,
    src: &mut TcpStream,
    dst: &mut TcpStream,
    read_timeout: Duration,
    phase: &'static str,
) -> Result<(), UpstreamError> {
    loop {
        let line = read_line(buf, src, read_timeout, phase).await?;
        dst.write_all(&line)
            .await
            .map_err(|e| write_aborted(phase, e))?;

        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }

        // Chunk data plus its trailing CRLF.
        relay_exact(buf, src, dst, size + 2, read_timeout, phase).await?;
    }

    // Trailer section, up to and including the blank line.
    loop {
        let line = read_line(buf, src, read_timeout, phase).await?;
        dst.write_all(&line)
            .await
            .map_err(|e| write_aborted(phase, e))?;

        if line == b"\r\n" {
            break;
        }
    }

    Ok(())
}

/// Relays until `src` closes. Used for responses without explicit framing.
async fn relay_until_eof(
    buf: &mut BytesMut,
    src: &mut TcpStream,
    dst: &mut TcpStream,
    read_timeout: Duration,
) -> Result<(), UpstreamError> {
    loop {
        if buf.is_empty() {
            let n = timed_read(src, buf, read_timeout, "response body").await?;
            if n == 0 {
                return Ok(());
            }
        }

        dst.write_all(&buf[..])
            .await
            .map_err(|e| write_aborted("response body", e))?;
        buf.clear();
    }
}

/// Reads one CRLF-terminated line (buffer first), returning it with its
/// terminator.
async fn read_line(
    buf: &mut BytesMut,
    src: &mut TcpStream,
    read_timeout: Duration,
    phase: &'static str,
) -> Result<Vec<u8>, UpstreamError> {
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            let line = buf.split_to(pos + 2);
            return Ok(line.to_vec());
        }

        if buf.len() > MAX_HEAD_BYTES {
            return Err(UpstreamError::StreamAborted(
                "chunk framing line too long".to_string(),
            ));
        }

        let n = timed_read(src, buf, read_timeout, phase).await?;
        if n == 0 {
            return Err(UpstreamError::StreamAborted(format!(
                "{phase}: connection closed inside chunked body"
            )));
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, UpstreamError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| UpstreamError::StreamAborted("invalid chunk framing".to_string()))?;

    let size_part = text
        .trim_end_matches("\r\n")
        .split(';')
        .next()
        .unwrap_or("")
        .trim();

    u64::from_str_radix(size_part, 16)
        .map_err(|_| UpstreamError::StreamAborted(format!("invalid chunk size {size_part:?}")))
}
