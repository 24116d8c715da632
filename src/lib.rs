//! rawhttp - HTTP/1.1 from raw TCP
//!
//! Streaming request parser, ordered response writer and a
//! task-per-connection server, built directly on tokio sockets.

pub mod config;
pub mod digest;
pub mod http;
pub mod proxy;
pub mod routes;
pub mod server;
