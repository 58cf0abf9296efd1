//! Config schema types: networks, routes and the channels routes deliver to.
use std::{
    fmt,
    hash::{Hash, Hasher},
};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{
    crypto,
    error::{Error, Result},
    validate,
};

/// Default IRC port for plain-text connections.
pub const DEFAULT_PORT: u16 = 6667;

/// Default IRC port for TLS connections.
pub const DEFAULT_SECURE_PORT: u16 = 6697;

// ── Networks ────────────────────────────────────────────────────────────────

/// An IRC network notifications can be delivered to.
///
/// Two networks compare equal when their name, host, effective port and
/// security flag match; credentials and cosmetic settings are ignored.
#[derive(Clone, Serialize, Deserialize)]
pub struct Network {
    /// Case-insensitive unique name, stored lower-cased. Serialized as the
    /// mapping key, never inside the record.
    #[serde(skip)]
    pub name: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_secret"
    )]
    pub server_password: Option<Secret<String>>,
    pub nick: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_username: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_secret"
    )]
    pub sasl_password: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickserv_username: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_secret"
    )]
    pub nickserv_password: Option<Secret<String>>,
    /// Local address to bind the outgoing socket to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// User modes to set after registration, without the leading `+`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<String>,
}

/// Parameters for creating or updating a [`Network`].
///
/// `None` keeps the current value on update.
#[derive(Debug, Clone, Default)]
pub struct NetworkParams {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u32>,
    pub secure: Option<bool>,
    pub server_password: Option<String>,
    pub nick: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub disable_sasl: bool,
    pub nickserv_username: Option<String>,
    pub nickserv_password: Option<String>,
    pub disable_nickserv: bool,
    pub bind: Option<String>,
    pub modes: Option<String>,
}

impl Network {
    /// Creates a new network. `name`, `host` and `nick` are required.
    pub fn new(params: NetworkParams) -> Result<Self> {
        let name = params
            .name
            .as_deref()
            .ok_or_else(|| Error::validation("networks must have a name"))?;
        let name = validate::require(name, validate::identifier, "invalid network name")?;
        let host = params
            .host
            .as_deref()
            .ok_or_else(|| Error::validation("networks must have a hostname"))?;
        let nick = params
            .nick
            .as_deref()
            .ok_or_else(|| Error::validation(format!("no nickname for {name:?} given")))?;

        let mut network = Self {
            host: validate::require(host, validate::host, "invalid hostname")?,
            nick: validate::require(nick, validate::string, "invalid nickname")?,
            name,
            port: None,
            secure: false,
            server_password: None,
            sasl_username: None,
            sasl_password: None,
            nickserv_username: None,
            nickserv_password: None,
            bind: None,
            modes: None,
        };
        network.update(params)?;
        Ok(network)
    }

    /// Applies every field present in `params`.
    pub fn update(&mut self, params: NetworkParams) -> Result<()> {
        if let Some(name) = params.name {
            self.name = validate::require(&name, validate::identifier, "invalid network name")?;
        }
        if let Some(host) = params.host {
            self.host = validate::require(&host, validate::host, "invalid hostname")?;
        }
        if let Some(port) = params.port {
            self.port = Some(
                validate::port(port)
                    .ok_or_else(|| Error::validation(format!("invalid port number {port}")))?,
            );
        }
        if let Some(secure) = params.secure {
            self.secure = secure;
        }
        if let Some(pass) = params.server_password {
            self.server_password = Some(secret_field(&pass, "invalid server password")?);
        }
        if let Some(nick) = params.nick {
            self.nick = validate::require(&nick, validate::string, "invalid nickname")?;
        }
        if let Some(user) = params.sasl_username {
            self.sasl_username =
                Some(validate::require(&user, validate::string, "invalid SASL username")?);
        }
        if let Some(pass) = params.sasl_password {
            self.sasl_password = Some(secret_field(&pass, "invalid SASL password")?);
        }
        if params.disable_sasl {
            self.sasl_username = None;
            self.sasl_password = None;
        }
        if let Some(user) = params.nickserv_username {
            self.nickserv_username = Some(validate::require(
                &user,
                validate::string,
                "invalid NickServ username",
            )?);
        }
        if let Some(pass) = params.nickserv_password {
            self.nickserv_password = Some(secret_field(&pass, "invalid NickServ password")?);
        }
        if params.disable_nickserv {
            self.nickserv_username = None;
            self.nickserv_password = None;
        }
        if let Some(bind) = params.bind {
            self.bind = Some(validate::require(&bind, validate::host, "invalid bind host")?);
        }
        if let Some(modes) = params.modes {
            self.modes = Some(validate::require(&modes, validate::modes, "invalid user modes")?);
        }
        Ok(())
    }

    /// Re-runs every sanitizer against the current values. Used after
    /// deserializing records that bypassed [`Network::new`].
    pub fn check(&mut self) -> Result<()> {
        self.name = validate::require(&self.name, validate::identifier, "invalid network name")?;
        self.host = validate::require(&self.host, validate::host, "invalid hostname")?;
        self.nick = validate::require(&self.nick, validate::string, "invalid nickname")?;
        if self.port == Some(0) {
            return Err(Error::validation("invalid port number 0"));
        }
        if let Some(modes) = self.modes.take() {
            self.modes = Some(validate::require(&modes, validate::modes, "invalid user modes")?);
        }
        Ok(())
    }

    /// Checks whether this network's name matches `name`, ignoring case.
    pub fn name_eq(&self, name: &str) -> bool {
        self.name == name.to_lowercase()
    }

    /// The port to connect to, defaulted by the security flag.
    pub fn real_port(&self) -> u16 {
        match (self.port, self.secure) {
            (Some(port), _) => port,
            (None, true) => DEFAULT_SECURE_PORT,
            (None, false) => DEFAULT_PORT,
        }
    }

    /// Whether `other` points at the same server endpoint, regardless of
    /// name.
    pub fn same_target(&self, other: &Network) -> bool {
        self.host == other.host
            && self.real_port() == other.real_port()
            && self.secure == other.secure
    }

    /// SASL credentials, when both halves are set.
    pub fn sasl(&self) -> Option<(&str, &str)> {
        credential_pair(self.sasl_username.as_deref(), self.sasl_password.as_ref())
    }

    /// NickServ credentials, when both halves are set.
    pub fn nickserv(&self) -> Option<(&str, &str)> {
        credential_pair(
            self.nickserv_username.as_deref(),
            self.nickserv_password.as_ref(),
        )
    }
}

fn credential_pair<'a>(
    user: Option<&'a str>,
    pass: Option<&'a Secret<String>>,
) -> Option<(&'a str, &'a str)> {
    match (user, pass) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.expose_secret().is_empty() => {
            Some((user, pass.expose_secret().as_str()))
        },
        _ => None,
    }
}

fn secret_field(value: &str, invalid: &str) -> Result<Secret<String>> {
    validate::string(value)
        .map(Secret::new)
        .ok_or_else(|| Error::validation(invalid.to_string()))
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.same_target(other)
    }
}

impl Eq for Network {}

impl Hash for Network {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.host.hash(state);
        self.real_port().hash(state);
        self.secure.hash(state);
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.real_port())
            .field("secure", &self.secure)
            .field("nick", &self.nick)
            .field("sasl", &self.sasl_username.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

// ── Channels ────────────────────────────────────────────────────────────────

/// An IRC channel bound to a network by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Name of the network this channel belongs to (lower-cased).
    pub network: String,
    pub name: String,
    /// Key required for joining, if any.
    pub key: Option<String>,
    /// Deliver without joining the channel first.
    pub send_external: bool,
}

/// Parameters describing a channel to add to a route.
#[derive(Debug, Clone, Default)]
pub struct ChannelParams {
    /// `network/#channel` identifier.
    pub identifier: String,
    pub key: Option<String>,
    pub send_external: Option<bool>,
}

impl ChannelParams {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }
}

impl Channel {
    /// Builds a channel from its `network/#channel` identifier.
    pub fn new(params: ChannelParams) -> Result<Self> {
        let (network, name) = params.identifier.split_once('/').ok_or_else(|| {
            Error::validation(format!("invalid channel identifier {:?}", params.identifier))
        })?;
        if network.is_empty() {
            return Err(Error::validation("channels must have a network"));
        }
        if name.is_empty() {
            return Err(Error::validation("channels must have a name"));
        }
        let key = match params.key {
            Some(key) if key.is_empty() => None,
            Some(key) => Some(validate::require(
                &key,
                validate::channel_key,
                "invalid channel key",
            )?),
            None => None,
        };
        Ok(Self {
            network: validate::require(network, validate::identifier, "invalid channel network")?,
            name: validate::require(name, validate::channel_name, "invalid channel name")?,
            key,
            send_external: params.send_external.unwrap_or(false),
        })
    }

    /// The string identifying this channel in configuration files.
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.network, self.name)
    }

    /// Checks whether `identifier` refers to this channel, ignoring case.
    pub fn identifier_eq(&self, identifier: &str) -> bool {
        self.identifier().to_lowercase() == identifier.to_lowercase()
    }

    /// The `JOIN` argument for this channel: the name, optionally followed by
    /// a space and the key.
    pub fn join_target(&self) -> String {
        match &self.key {
            Some(key) => format!("{} {key}", self.name),
            None => self.name.clone(),
        }
    }
}

/// On-disk body of a channel entry; the identifier is the mapping key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ChannelRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default)]
    send_external: bool,
}

mod channel_map {
    use std::fmt;

    use serde::{
        Deserializer, Serializer,
        de::{self, MapAccess, Visitor},
    };

    use super::{Channel, ChannelParams, ChannelRecord};

    pub fn serialize<S: Serializer>(channels: &[Channel], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(channels.iter().map(|channel| {
            (channel.identifier(), ChannelRecord {
                key: channel.key.clone(),
                send_external: channel.send_external,
            })
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Channel>, D::Error> {
        struct Entries;

        impl<'de> Visitor<'de> for Entries {
            type Value = Vec<Channel>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of network/channel identifiers")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut channels = Vec::new();
                while let Some((identifier, record)) =
                    map.next_entry::<String, Option<ChannelRecord>>()?
                {
                    let record = record.unwrap_or_default();
                    let channel = Channel::new(ChannelParams {
                        identifier,
                        key: record.key,
                        send_external: Some(record.send_external),
                    })
                    .map_err(de::Error::custom)?;
                    channels.push(channel);
                }
                Ok(channels)
            }
        }

        deserializer.deserialize_any(Entries)
    }
}

// ── Routes ──────────────────────────────────────────────────────────────────

/// A route (integration) mapping an inbound endpoint to delivery channels.
#[derive(Clone, Serialize, Deserialize)]
pub struct Route {
    /// Case-insensitive unique name, stored lower-cased. Serialized as the
    /// mapping key.
    #[serde(skip)]
    pub name: String,
    pub endpoint: String,
    /// Shared secret used to verify payload signatures. Empty disables
    /// verification.
    #[serde(default = "blank_secret", serialize_with = "serialize_secret")]
    pub secret: Secret<String>,
    #[serde(default, with = "channel_map")]
    pub channels: Vec<Channel>,
}

/// Parameters for creating or updating a [`Route`].
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub secret: Option<String>,
    /// Replaces the channel list on create.
    pub channels: Vec<ChannelParams>,
    pub clear_channels: bool,
    pub delete_channels: Vec<String>,
    pub add_channels: Vec<ChannelParams>,
}

impl Route {
    /// Creates a new route. A missing endpoint or secret is generated.
    pub fn new(params: RouteParams) -> Result<Self> {
        let name = params
            .name
            .as_deref()
            .ok_or_else(|| Error::validation("routes must have a name"))?;
        let mut route = Self {
            name: validate::require(name, validate::identifier, "invalid route name")?,
            endpoint: crypto::generate_endpoint(),
            secret: Secret::new(crypto::generate_secret()),
            channels: Vec::new(),
        };
        let channels = params
            .channels
            .iter()
            .cloned()
            .map(Channel::new)
            .collect::<Result<Vec<_>>>()?;
        route.update(RouteParams {
            channels: Vec::new(),
            ..params
        })?;
        route.add_channels(channels)?;
        Ok(route)
    }

    /// Applies name, endpoint and secret changes. Channel edits go through
    /// [`Route::edit_channels`].
    pub fn update(&mut self, params: RouteParams) -> Result<()> {
        if let Some(name) = params.name {
            self.name = validate::require(&name, validate::identifier, "invalid route name")?;
        }
        if let Some(endpoint) = params.endpoint {
            self.endpoint = validate::require(&endpoint, validate::endpoint, "invalid endpoint")?;
        }
        if let Some(secret) = params.secret {
            let secret = validate::secret(&secret)
                .ok_or_else(|| Error::validation("invalid secret"))?;
            self.secret = Secret::new(secret);
        }
        Ok(())
    }

    /// Clears, deletes and adds channels, in that order.
    pub fn edit_channels(&mut self, params: &RouteParams) -> Result<()> {
        if params.clear_channels {
            self.channels.clear();
        }
        self.delete_channels(&params.delete_channels)?;
        let added = params
            .add_channels
            .iter()
            .cloned()
            .map(Channel::new)
            .collect::<Result<Vec<_>>>()?;
        self.add_channels(added)
    }

    /// Adds channels, rejecting identifiers that already exist.
    pub fn add_channels(&mut self, channels: Vec<Channel>) -> Result<()> {
        for channel in channels {
            let identifier = channel.identifier();
            if self.channels.iter().any(|c| c.identifier_eq(&identifier)) {
                return Err(Error::command(format!(
                    "channel {identifier:?} already exists"
                )));
            }
            self.channels.push(channel);
        }
        Ok(())
    }

    /// Removes channels by identifier, rejecting identifiers that do not
    /// exist.
    pub fn delete_channels(&mut self, identifiers: &[String]) -> Result<()> {
        for identifier in identifiers {
            let index = self
                .channels
                .iter()
                .position(|c| c.identifier_eq(identifier))
                .ok_or_else(|| {
                    Error::command(format!("channel {identifier:?} does not exist"))
                })?;
            self.channels.remove(index);
        }
        Ok(())
    }

    /// Re-runs the sanitizers on a deserialized record.
    pub fn check(&mut self) -> Result<()> {
        self.name = validate::require(&self.name, validate::identifier, "invalid route name")?;
        self.endpoint = validate::require(&self.endpoint, validate::endpoint, "invalid endpoint")?;
        if validate::secret(self.secret.expose_secret()).is_none() {
            return Err(Error::validation("invalid secret"));
        }
        Ok(())
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name == name.to_lowercase()
    }

    pub fn endpoint_eq(&self, endpoint: &str) -> bool {
        self.endpoint == endpoint
    }

    /// Whether payloads delivered to this route must carry a signature.
    pub fn verifies_signatures(&self) -> bool {
        !self.secret.expose_secret().is_empty()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("secret", &"[REDACTED]")
            .field("channels", &self.channels)
            .finish()
    }
}

// ── Root ────────────────────────────────────────────────────────────────────

/// The whole durable state: networks and routes, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub networks: Vec<Network>,
    pub routes: Vec<Route>,
}

impl RelayConfig {
    pub fn find_network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name_eq(name))
    }

    pub fn find_network_mut(&mut self, name: &str) -> Option<&mut Network> {
        self.networks.iter_mut().find(|n| n.name_eq(name))
    }

    pub fn find_route(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name_eq(name))
    }

    pub fn find_route_mut(&mut self, name: &str) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| r.name_eq(name))
    }

    pub fn find_route_by_endpoint(&self, endpoint: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.endpoint_eq(endpoint))
    }

    /// Every channel, across all routes, bound to the named network. Channels
    /// listed by several routes appear once.
    pub fn channels_for(&self, network: &str) -> Vec<Channel> {
        let mut channels: Vec<Channel> = Vec::new();
        for channel in self.routes.iter().flat_map(|r| &r.channels) {
            if channel.network == network.to_lowercase()
                && !channels
                    .iter()
                    .any(|c| c.name.to_lowercase() == channel.name.to_lowercase())
            {
                channels.push(channel.clone());
            }
        }
        channels
    }

    /// Rewrites channel references from network `from` to network `to`.
    pub fn rename_network_refs(&mut self, from: &str, to: &str) {
        let (from, to) = (from.to_lowercase(), to.to_lowercase());
        for channel in self.routes.iter_mut().flat_map(|r| r.channels.iter_mut()) {
            if channel.network == from {
                channel.network.clone_from(&to);
            }
        }
    }

    /// Drops channels whose network no longer exists. Returns how many were
    /// removed.
    pub fn prune_orphans(&mut self) -> usize {
        let names: Vec<String> = self.networks.iter().map(|n| n.name.clone()).collect();
        let mut pruned = 0;
        for route in &mut self.routes {
            let before = route.channels.len();
            route.channels.retain(|c| names.contains(&c.network));
            pruned += before - route.channels.len();
        }
        pruned
    }
}

fn blank_secret() -> Secret<String> {
    Secret::new(String::new())
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_opt_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}
