//! Shared error plumbing and filesystem locations used across hookbot crates.

pub mod error;
pub mod paths;

pub use error::FromMessage;
