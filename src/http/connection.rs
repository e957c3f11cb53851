use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::http::parser::{ParseError, parse_request_head};
use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::{Forwarder, RouteTable, UpstreamError};

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    peer: SocketAddr,
    table: Arc<RouteTable>,
    forwarder: Forwarder,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        table: Arc<RouteTable>,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            peer,
            table,
            forwarder,
        }
    }

    /// Serves requests on this connection until it closes.
    ///
    /// Each request moves through match, resolve, and forward; per-request
    /// failures become error responses and never take the process down.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let head = match self.read_request_head().await? {
                Some(head) => head,
                None => return Ok(()),
            };

            let keep_alive = self.dispatch(head).await?;
            if !keep_alive {
                return Ok(());
            }
        }
    }

    /// Reads and parses the next request head. `None` means the client
    /// closed the connection cleanly between requests.
    async fn read_request_head(&mut self) -> anyhow::Result<Option<RequestHead>> {
        loop {
            // Try parsing whatever we already have
            match parse_request_head(&self.buffer) {
                Ok((head, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(head));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data, fall through to read
                }

                Err(e) => {
                    // Malformed request: answer 400 and give up on the
                    // connection.
                    let resp = Response::bad_request("The request could not be parsed.");
                    let _ = self.write_local(resp, false).await;
                    anyhow::bail!("request parse error from {}: {e}", self.peer);
                }
            }

            self.buffer.reserve(1024);
            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                anyhow::bail!("client {} closed mid request head", self.peer);
            }
        }
    }

    /// Runs one request through the routing pipeline. Returns whether the
    /// connection may serve another request.
    async fn dispatch(&mut self, head: RequestHead) -> anyhow::Result<bool> {
        let path = head.path_only().to_string();
        let query = head.query().map(str::to_string);

        trace!(peer = %self.peer, method = head.method.as_str(), path = %path, "request received");

        // A local response cannot reuse the connection if unread body
        // bytes are still in flight.
        let reusable_after_local = head.keep_alive() && !head.has_body();

        let target = match self.table.find(&path) {
            Some((route, path_match)) => {
                debug!(path = %path, pattern = ?route.pattern, "route matched");

                match route.resolve(&path, &path_match, query.as_deref()) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(path = %path, error = %e, "target resolution failed");
                        let resp =
                            Response::bad_request("The matched route produced no valid target.");
                        self.write_local(resp, reusable_after_local).await?;
                        return Ok(reusable_after_local);
                    }
                }
            }

            None => {
                warn!(path = %path, "no route matches");
                self.write_local(Response::not_found(), reusable_after_local)
                    .await?;
                return Ok(reusable_after_local);
            }
        };

        debug!(target = %target, "target resolved");

        let forwarder = self.forwarder;
        match forwarder
            .forward(&mut self.stream, &mut self.buffer, &head, &target)
            .await
        {
            Ok(outcome) => {
                info!(
                    method = head.method.as_str(),
                    path = %head.path,
                    target = %target,
                    status = outcome.status,
                    "request forwarded"
                );
                Ok(outcome.reusable)
            }

            Err(failure) if !failure.response_started => {
                warn!(
                    target = %target,
                    error = %failure.error,
                    "upstream failure"
                );

                // The request body may be partially consumed; never reuse.
                let resp = match failure.error {
                    UpstreamError::Timeout(_) => {
                        Response::gateway_timeout("The upstream did not respond in time.")
                    }
                    _ => Response::bad_gateway("The upstream could not be reached."),
                };
                self.write_local(resp, false).await?;
                Ok(false)
            }

            Err(failure) => {
                // Response bytes already reached the client; terminate
                // abruptly rather than emit a second status line.
                warn!(
                    target = %target,
                    error = %failure.error,
                    "relay aborted after response start"
                );
                Ok(false)
            }
        }
    }

    async fn write_local(&mut self, mut resp: Response, keep_alive: bool) -> anyhow::Result<()> {
        resp.headers.set(
            "Connection",
            if keep_alive { "keep-alive" } else { "close" },
        );

        let mut writer = ResponseWriter::new(&resp);
        writer.write_to_stream(&mut self.stream).await
    }
}
