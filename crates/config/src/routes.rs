use std::sync::Arc;

use tracing::info;

use crate::{
    error::{Error, Result},
    schema::{Channel, RelayConfig, Route, RouteParams},
    store::ConfigStore,
};

/// Create, update and destroy routes through store transactions.
#[derive(Debug, Clone)]
pub struct RouteManager {
    store: Arc<ConfigStore>,
}

impl RouteManager {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, params: RouteParams) -> Result<Route> {
        let route = self.store.transaction(|config| {
            let route = Route::new(params)?;
            if config.find_route(&route.name).is_some() {
                return Err(Error::command(format!(
                    "a route with the name {:?} already exists",
                    route.name
                )));
            }
            ensure_endpoint_free(config, &route.endpoint, None)?;
            ensure_networks_exist(config, &route.channels)?;
            config.routes.push(route.clone());
            Ok(route)
        })?;
        info!(route = %route.name, channels = route.channels.len(), "route created");
        Ok(route)
    }

    /// Update the named route. Channel edits apply as clear, delete, add;
    /// name, endpoint and secret changes apply alongside them.
    pub fn update(&self, name: &str, params: RouteParams) -> Result<Route> {
        self.store.transaction(|config| {
            let index = route_index(&config.routes, name)?;

            if let Some(new_name) = params.name.as_deref()
                && !config.routes[index].name_eq(new_name)
                && config.find_route(new_name).is_some()
            {
                return Err(Error::command(format!(
                    "a route with the name {:?} already exists",
                    new_name.to_lowercase()
                )));
            }
            if let Some(endpoint) = params.endpoint.as_deref() {
                ensure_endpoint_free(config, endpoint, Some(index))?;
            }

            let mut route = config.routes[index].clone();
            route.edit_channels(&params)?;
            route.update(params)?;
            ensure_networks_exist(config, &route.channels)?;
            config.routes[index] = route.clone();
            Ok(route)
        })
    }

    pub fn destroy(&self, name: &str) -> Result<Route> {
        let route = self.store.transaction(|config| {
            let index = route_index(&config.routes, name)?;
            Ok(config.routes.remove(index))
        })?;
        info!(route = %route.name, "route destroyed");
        Ok(route)
    }

    pub fn find(&self, name: &str) -> Option<Route> {
        self.store.snapshot().find_route(name).cloned()
    }

    pub fn find_by_endpoint(&self, endpoint: &str) -> Option<Route> {
        self.store.snapshot().find_route_by_endpoint(endpoint).cloned()
    }

    /// Every route whose name contains `search`, in insertion order.
    pub fn list(&self, search: Option<&str>) -> Vec<Route> {
        let search = search.map(str::to_lowercase);
        self.store
            .routes()
            .into_iter()
            .filter(|r| search.as_deref().is_none_or(|s| r.name.contains(s)))
            .collect()
    }
}

fn route_index(routes: &[Route], name: &str) -> Result<usize> {
    routes.iter().position(|r| r.name_eq(name)).ok_or_else(|| {
        Error::command(format!(
            "a route with the name {:?} does not exist",
            name.to_lowercase()
        ))
    })
}

fn ensure_endpoint_free(config: &RelayConfig, endpoint: &str, except: Option<usize>) -> Result<()> {
    let taken = config
        .routes
        .iter()
        .enumerate()
        .any(|(i, r)| Some(i) != except && r.endpoint_eq(endpoint));
    if taken {
        return Err(Error::command(format!(
            "a route with the endpoint {endpoint:?} already exists"
        )));
    }
    Ok(())
}

fn ensure_networks_exist(config: &RelayConfig, channels: &[Channel]) -> Result<()> {
    match channels
        .iter()
        .find(|c| config.find_network(&c.network).is_none())
    {
        Some(channel) => Err(Error::command(format!(
            "a network with the name {:?} does not exist",
            channel.network
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            networks::NetworkManager,
            schema::{ChannelParams, NetworkParams},
        },
    };

    fn setup() -> (tempfile::TempDir, RouteManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path().join("hookbot.yml")).unwrap());
        NetworkManager::new(Arc::clone(&store))
            .create(NetworkParams {
                name: Some("freenode".into()),
                host: Some("irc.example.org".into()),
                nick: Some("bot".into()),
                ..Default::default()
            })
            .unwrap();
        (dir, RouteManager::new(store))
    }

    fn create(routes: &RouteManager, name: &str, endpoint: &str) -> Result<Route> {
        routes.create(RouteParams {
            name: Some(name.into()),
            endpoint: Some(endpoint.into()),
            channels: vec![ChannelParams::new("freenode/#hookbot")],
            ..Default::default()
        })
    }

    #[test]
    fn names_and_endpoints_are_unique() {
        let (_dir, routes) = setup();
        create(&routes, "a", "one").unwrap();
        assert!(matches!(create(&routes, "A", "two"), Err(Error::Command(_))));
        assert!(matches!(create(&routes, "b", "one"), Err(Error::Command(_))));
        assert_eq!(routes.list(None).len(), 1);
    }

    #[test]
    fn unknown_network_is_rejected() {
        let (_dir, routes) = setup();
        let err = routes
            .create(RouteParams {
                name: Some("a".into()),
                channels: vec![ChannelParams::new("nowhere/#chan")],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn update_edits_channels_in_order() {
        let (_dir, routes) = setup();
        create(&routes, "a", "one").unwrap();

        let route = routes
            .update("a", RouteParams {
                clear_channels: true,
                add_channels: vec![
                    ChannelParams::new("freenode/#one"),
                    ChannelParams {
                        identifier: "freenode/#two".into(),
                        key: Some("k".into()),
                        send_external: Some(true),
                    },
                ],
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<_> = route.channels.iter().map(Channel::identifier).collect();
        assert_eq!(ids, ["freenode/#one", "freenode/#two"]);
        assert!(route.channels[1].send_external);
    }

    #[test]
    fn failed_update_rolls_back() {
        let (_dir, routes) = setup();
        create(&routes, "a", "one").unwrap();
        let err = routes
            .update("a", RouteParams {
                endpoint: Some("two".into()),
                delete_channels: vec!["freenode/#missing".into()],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert!(routes.find_by_endpoint("one").is_some());
        assert!(routes.find_by_endpoint("two").is_none());
    }

    #[test]
    fn endpoint_can_be_kept_on_update() {
        let (_dir, routes) = setup();
        create(&routes, "a", "one").unwrap();
        routes
            .update("a", RouteParams {
                endpoint: Some("one".into()),
                secret: Some(String::new()),
                ..Default::default()
            })
            .unwrap();
        assert!(!routes.find("a").unwrap().verifies_signatures());
    }

    #[test]
    fn destroy_removes_route() {
        let (_dir, routes) = setup();
        create(&routes, "a", "one").unwrap();
        routes.destroy("A").unwrap();
        assert!(routes.find("a").is_none());
        assert!(matches!(routes.destroy("a"), Err(Error::Command(_))));
    }
}
