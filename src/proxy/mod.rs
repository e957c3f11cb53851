//! Reverse proxy functionality.
//!
//! This module implements the routing core: the route table, upstream
//! target resolution, and request forwarding.

pub mod route;
pub mod target;
pub mod upstream;

pub use route::{PathMatch, Pattern, Route, RouteTable};
pub use target::{ResolveError, Target};
pub use upstream::{ForwardError, Forwarder, RelayOutcome, UpstreamError};
