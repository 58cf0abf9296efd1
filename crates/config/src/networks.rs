use std::sync::Arc;

use tracing::info;

use crate::{
    error::{Error, Result},
    schema::{Network, NetworkParams},
    store::ConfigStore,
};

/// Create, update and destroy networks through store transactions.
#[derive(Debug, Clone)]
pub struct NetworkManager {
    store: Arc<ConfigStore>,
}

impl NetworkManager {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, params: NetworkParams) -> Result<Network> {
        let network = self.store.transaction(|config| {
            let network = Network::new(params)?;
            if config.find_network(&network.name).is_some() {
                return Err(Error::command(format!(
                    "a network with the name {:?} already exists",
                    network.name
                )));
            }
            config.networks.push(network.clone());
            Ok(network)
        })?;
        info!(network = %network.name, host = %network.host, "network created");
        Ok(network)
    }

    /// Update the named network. A rename is carried into every route
    /// channel bound to it.
    pub fn update(&self, name: &str, params: NetworkParams) -> Result<Network> {
        self.store.transaction(|config| {
            let index = network_index(&config.networks, name)?;
            let old_name = config.networks[index].name.clone();

            if let Some(new_name) = params.name.as_deref()
                && !config.networks[index].name_eq(new_name)
                && config.find_network(new_name).is_some()
            {
                return Err(Error::command(format!(
                    "a network with the name {:?} already exists",
                    new_name.to_lowercase()
                )));
            }

            config.networks[index].update(params)?;
            let network = config.networks[index].clone();
            if network.name != old_name {
                config.rename_network_refs(&old_name, &network.name);
                info!(from = %old_name, to = %network.name, "network renamed");
            }
            Ok(network)
        })
    }

    /// Remove the named network. Route channels bound to it are pruned on
    /// commit.
    pub fn destroy(&self, name: &str) -> Result<Network> {
        let network = self.store.transaction(|config| {
            let index = network_index(&config.networks, name)?;
            Ok(config.networks.remove(index))
        })?;
        info!(network = %network.name, "network destroyed");
        Ok(network)
    }

    pub fn find(&self, name: &str) -> Option<Network> {
        self.store.snapshot().find_network(name).cloned()
    }

    /// Every network whose name contains `search`, in insertion order.
    pub fn list(&self, search: Option<&str>) -> Vec<Network> {
        let search = search.map(str::to_lowercase);
        self.store
            .networks()
            .into_iter()
            .filter(|n| search.as_deref().is_none_or(|s| n.name.contains(s)))
            .collect()
    }
}

fn network_index(networks: &[Network], name: &str) -> Result<usize> {
    networks
        .iter()
        .position(|n| n.name_eq(name))
        .ok_or_else(|| {
            Error::command(format!(
                "a network with the name {:?} does not exist",
                name.to_lowercase()
            ))
        })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{routes::RouteManager, schema::{ChannelParams, RouteParams}},
    };

    fn params(name: &str, host: &str) -> NetworkParams {
        NetworkParams {
            name: Some(name.into()),
            host: Some(host.into()),
            nick: Some("bot".into()),
            ..Default::default()
        }
    }

    fn managers() -> (tempfile::TempDir, NetworkManager, RouteManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path().join("hookbot.yml")).unwrap());
        (
            dir,
            NetworkManager::new(Arc::clone(&store)),
            RouteManager::new(store),
        )
    }

    #[test]
    fn create_rejects_duplicates() {
        let (_dir, networks, _) = managers();
        networks.create(params("freenode", "irc.example.org")).unwrap();
        let err = networks.create(params("FreeNode", "irc.other.org")).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(networks.list(None).len(), 1);
    }

    #[test]
    fn update_missing_is_command_error() {
        let (_dir, networks, _) = managers();
        let err = networks.update("nope", NetworkParams::default()).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn rename_carries_into_route_channels() {
        let (_dir, networks, routes) = managers();
        networks.create(params("freenode", "irc.example.org")).unwrap();
        routes
            .create(RouteParams {
                name: Some("repo-hook".into()),
                channels: vec![ChannelParams::new("freenode/#hookbot")],
                ..Default::default()
            })
            .unwrap();

        networks
            .update("freenode", NetworkParams {
                name: Some("libera".into()),
                ..Default::default()
            })
            .unwrap();

        let route = routes.find("repo-hook").unwrap();
        assert_eq!(route.channels[0].identifier(), "libera/#hookbot");
    }

    #[test]
    fn rename_onto_existing_name_fails() {
        let (_dir, networks, _) = managers();
        networks.create(params("a", "irc.a.org")).unwrap();
        networks.create(params("b", "irc.b.org")).unwrap();
        let err = networks
            .update("a", NetworkParams {
                name: Some("B".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert!(networks.find("a").is_some());
    }

    #[test]
    fn destroy_prunes_channels() {
        let (_dir, networks, routes) = managers();
        networks.create(params("freenode", "irc.example.org")).unwrap();
        routes
            .create(RouteParams {
                name: Some("repo-hook".into()),
                channels: vec![ChannelParams::new("freenode/#hookbot")],
                ..Default::default()
            })
            .unwrap();

        networks.destroy("FREENODE").unwrap();
        assert!(networks.list(None).is_empty());
        assert!(routes.find("repo-hook").unwrap().channels.is_empty());
    }

    #[test]
    fn list_filters_by_substring() {
        let (_dir, networks, _) = managers();
        networks.create(params("freenode", "irc.a.org")).unwrap();
        networks.create(params("libera", "irc.b.org")).unwrap();
        let names: Vec<_> = networks.list(Some("FREE")).into_iter().map(|n| n.name).collect();
        assert_eq!(names, ["freenode"]);
    }
}
