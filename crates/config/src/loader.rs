//! YAML persistence for [`RelayConfig`].
//!
//! The file is a mapping with two sections, `networks` and `routes`, each
//! keyed by name:
//!
//! ```yaml
//! networks:
//!   freenode:
//!     host: irc.example.org
//!     secure: true
//!     nick: hookbot
//! routes:
//!   repo-hook:
//!     endpoint: 9f1c...
//!     secret: c2VjcmV0
//!     channels:
//!       freenode/#hookbot: {}
//! ```
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use {
    serde::de::DeserializeOwned,
    serde_yaml::{Mapping, Value},
    tracing::{debug, warn},
};

use crate::{
    error::{Context, Error, Result},
    schema::{Network, RelayConfig, Route},
};

const NETWORKS_KEY: &str = "networks";
const ROUTES_KEY: &str = "routes";

/// Parse the YAML text of a configuration file.
pub fn parse(raw: &str) -> Result<RelayConfig> {
    let root: Value = serde_yaml::from_str(raw).context("malformed YAML")?;
    let root = match root {
        Value::Null => return Ok(RelayConfig::default()),
        Value::Mapping(root) => root,
        _ => return Err(Error::configuration("top level must be a mapping")),
    };

    for key in root.keys() {
        if !matches!(key.as_str(), Some(NETWORKS_KEY | ROUTES_KEY)) {
            warn!(key = ?key, "ignoring unknown configuration section");
        }
    }

    let mut config = RelayConfig::default();

    for (name, mut network) in section::<Network>(&root, NETWORKS_KEY)? {
        network.name = name.clone();
        network
            .check()
            .with_context(|| format!("{NETWORKS_KEY}.{name}"))?;
        if config.find_network(&network.name).is_some() {
            return Err(Error::configuration(format!(
                "{NETWORKS_KEY}.{name}: duplicate network name"
            )));
        }
        config.networks.push(network);
    }

    for (name, mut route) in section::<Route>(&root, ROUTES_KEY)? {
        route.name = name.clone();
        route
            .check()
            .with_context(|| format!("{ROUTES_KEY}.{name}"))?;
        if config.find_route(&route.name).is_some() {
            return Err(Error::configuration(format!(
                "{ROUTES_KEY}.{name}: duplicate route name"
            )));
        }
        if config.find_route_by_endpoint(&route.endpoint).is_some() {
            return Err(Error::configuration(format!(
                "{ROUTES_KEY}.{name}.endpoint: endpoint already in use"
            )));
        }
        config.routes.push(route);
    }

    let pruned = config.prune_orphans();
    if pruned > 0 {
        warn!(pruned, "dropped channels referring to unknown networks");
    }

    Ok(config)
}

/// Deserialize every entry of a top-level section, keeping file order.
fn section<T: DeserializeOwned>(root: &Mapping, key: &str) -> Result<Vec<(String, T)>> {
    let entries = match root.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Mapping(entries)) => entries,
        Some(_) => return Err(Error::configuration(format!("{key} must be a mapping"))),
    };

    entries
        .iter()
        .map(|(name, body)| {
            let name = name
                .as_str()
                .with_context(|| format!("{key}: names must be strings"))?;
            let body =
                serde_yaml::from_value(body.clone()).with_context(|| format!("{key}.{name}"))?;
            Ok((name.to_string(), body))
        })
        .collect()
}

/// Render a configuration as YAML text.
pub fn render(config: &RelayConfig) -> Result<String> {
    let mut networks = Mapping::new();
    for network in &config.networks {
        networks.insert(
            Value::String(network.name.clone()),
            serde_yaml::to_value(network)?,
        );
    }

    let mut routes = Mapping::new();
    for route in &config.routes {
        routes.insert(Value::String(route.name.clone()), serde_yaml::to_value(route)?);
    }

    let mut root = Mapping::new();
    root.insert(NETWORKS_KEY.into(), Value::Mapping(networks));
    root.insert(ROUTES_KEY.into(), Value::Mapping(routes));
    Ok(serde_yaml::to_string(&root)?)
}

/// Read and parse the file at `path`. Returns `None` when it does not exist.
pub fn load(path: &Path) -> Result<Option<RelayConfig>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    parse(&raw).map(Some)
}

/// Write `config` to `path` atomically: the text goes to a sibling
/// temporary file which then replaces the target.
///
/// Creates parent directories if needed.
pub fn save(path: &Path, config: &RelayConfig) -> Result<()> {
    let text = render(config)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    if let Err(e) = write_and_replace(tmp, path, &text) {
        let _ = fs::remove_file(tmp);
        return Err(e.into());
    }

    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn write_and_replace(tmp: &Path, path: &Path, text: &str) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()?;
    fs::rename(tmp, path)
}
