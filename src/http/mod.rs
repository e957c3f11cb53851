//! HTTP protocol layer.
//!
//! Implements the inbound HTTP/1.1 side of the proxy: connection handling,
//! request-head parsing, and locally generated responses. Relayed upstream
//! responses bypass this layer's response types entirely.
//!
//! # Architecture
//!
//! - **`connection`**: the per-connection request loop driving the routing
//!   pipeline
//! - **`headers`**: ordered header list preserving wire order and duplicates
//! - **`parser`**: parses request heads from byte buffers
//! - **`request`**: request-head representation and helpers
//! - **`response`**: locally generated error responses
//! - **`writer`**: serializes and writes local responses to the client
//!
//! # Request Pipeline
//!
//! Each request on a connection moves through:
//!
//! ```text
//!        ┌──────────────┐
//!        │   Received   │ ← request head parsed off the socket
//!        └──────┬───────┘
//!               │ route table lookup
//!               ▼
//!        ┌──────────────┐      no match → 404
//!        │   Matched    │
//!        └──────┬───────┘
//!               │ target resolution
//!               ▼
//!        ┌──────────────┐      invalid target → 400
//!        │   Resolved   │
//!        └──────┬───────┘
//!               │ upstream call, streaming relay
//!               ▼
//!        ┌──────────────┐      upstream failure → 502/504,
//!        │  Forwarding  │      or abort if the response started
//!        └──────┬───────┘
//!               │ response relayed
//!               ▼
//!        ┌──────────────┐
//!        │  Completed   │ → keep-alive: next request, else close
//!        └──────────────┘
//! ```

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
