//! Runtime side of hookbot: one worker thread per network connection, a
//! reconciler that keeps them in line with the configuration, and a named
//! pipe for operator commands.

pub mod bot;
pub mod connection;
pub mod control;
pub mod error;
pub mod link;
pub mod message;
pub mod pool;
pub mod thread;

pub use {
    bot::Core,
    connection::{Connection, ConnectionState},
    control::{ControlChannel, ControlClient, ControlCommand, ControlHandler},
    error::{Context, Error, Result},
    link::{Link, LinkConnector, LinkSpec, ReadySignal},
    message::Message,
    pool::{ConnectionPool, NetworkDiff},
    thread::{StopSignal, ThreadController},
};
