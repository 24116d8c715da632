//! TCP accept loop and the handler boundary.

pub mod handler;
pub mod listener;

pub use handler::{Buffered, Handler};
pub use listener::Server;
