//! Inbound side of hookbot: accepts provider webhooks, authenticates them
//! against the route's secret and turns the payload into IRC lines.

pub mod error;
pub mod event;
pub mod format;
pub mod server;
pub mod signature;
pub mod style;

pub use {
    error::Rejection,
    event::EventKind,
    server::{DEFAULT_BIND, DEFAULT_PORT, build_router, serve},
};
