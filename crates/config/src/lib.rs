//! Durable relay configuration: networks, routes and their channels.
//!
//! State lives in a single YAML file (`~/.config/hookbot/hookbot.yml` by
//! default) and is only ever changed through [`ConfigStore::transaction`].

pub mod crypto;
pub mod error;
pub mod loader;
pub mod networks;
pub mod routes;
pub mod schema;
pub mod store;
pub mod validate;

pub use {
    error::{Context, Error, Result},
    networks::NetworkManager,
    routes::RouteManager,
    schema::{
        Channel, ChannelParams, DEFAULT_PORT, DEFAULT_SECURE_PORT, Network, NetworkParams,
        RelayConfig, Route, RouteParams,
    },
    store::{ConfigStore, MigrateCallback},
};
