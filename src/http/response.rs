use crate::http::headers::Headers;

/// Status codes for locally generated responses.
///
/// Only the proxy's own error pages use this type. Relayed upstream
/// responses keep their original status line untouched and never pass
/// through here.
///
/// - `BadRequest` (400): malformed request, or a matched route that could
///   not produce a valid upstream URL
/// - `NotFound` (404): no route matches and no fallback is configured
/// - `BadGateway` (502): upstream connect failure or aborted stream
/// - `GatewayTimeout` (504): upstream exceeded a configured timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    BadRequest,
    NotFound,
    BadGateway,
    GatewayTimeout,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::BadGateway => 502,
            StatusCode::GatewayTimeout => 504,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }
}

/// A locally generated HTTP response, ready to be serialized.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Builder for constructing responses in a fluent style.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response, adding Content-Length if absent.
    pub fn build(mut self) -> Response {
        if self.headers.get("Content-Length").is_none() {
            self.headers.push("Content-Length", self.body.len().to_string());
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    fn plain(status: StatusCode, body: String) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain")
            .body(body.into_bytes())
            .build()
    }

    /// 404 for a path no route matches.
    pub fn not_found() -> Self {
        Self::plain(
            StatusCode::NotFound,
            "404 Not Found\r\n\r\nNo route matches the request path.".to_string(),
        )
    }

    /// 400 for protocol errors and failed target resolution.
    pub fn bad_request(detail: &str) -> Self {
        Self::plain(
            StatusCode::BadRequest,
            format!("400 Bad Request\r\n\r\n{detail}"),
        )
    }

    /// 502 for upstream connect failures and aborted streams.
    pub fn bad_gateway(detail: &str) -> Self {
        Self::plain(
            StatusCode::BadGateway,
            format!("502 Bad Gateway\r\n\r\n{detail}"),
        )
    }

    /// 504 for upstreams that exceed a configured timeout.
    pub fn gateway_timeout(detail: &str) -> Self {
        Self::plain(
            StatusCode::GatewayTimeout,
            format!("504 Gateway Timeout\r\n\r\n{detail}"),
        )
    }
}
