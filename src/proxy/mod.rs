//! Upstream proxying
//!
//! Relays `/httpbin/...` requests to a configured upstream and re-frames the
//! answer as a chunked response with digest trailers.

pub mod upstream;

pub use upstream::{ProxyHandler, UpstreamBody, UpstreamHead};
