//! IRC transport for hookbot: a blocking session per network speaking just
//! enough of the protocol to register, authenticate, join and deliver.

pub mod link;
pub mod proto;
pub mod session;
pub mod state;
pub mod transport;

pub use link::{IrcConnector, IrcLink};
