//! Keeps one [`Connection`] per configured network.
//!
//! Every committed configuration change lands in [`ConnectionPool::migrate_to`],
//! which diffs the networks it last saw (the checkpoint) against the new
//! ones and starts, stops or relabels connections to match.
use std::sync::Arc;

use {
    parking_lot::{Mutex, RwLock},
    tracing::{debug, error, info, warn},
};

use hookbot_config::{ConfigStore, Network, RelayConfig};

use crate::{connection::Connection, link::LinkConnector, message::Message};

#[derive(Debug, Default)]
struct PoolState {
    active: bool,
    checkpoint: Vec<Network>,
}

/// The outcome of diffing two sets of networks.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NetworkDiff {
    pub kept: Vec<Network>,
    /// Pairs of (old, new) records pointing at the same server.
    pub renamed: Vec<(Network, Network)>,
    pub removed: Vec<Network>,
    pub added: Vec<Network>,
}

impl NetworkDiff {
    /// Diff `current` against `desired`.
    ///
    /// Networks equal on both sides are kept. Of the rest, a removed and an
    /// added network with the same host, port and security are paired as a
    /// rename.
    pub fn between(current: &[Network], desired: &[Network]) -> Self {
        let mut removed: Vec<Network> = current
            .iter()
            .filter(|n| !desired.contains(n))
            .cloned()
            .collect();
        let mut added: Vec<Network> = desired
            .iter()
            .filter(|n| !current.contains(n))
            .cloned()
            .collect();
        let kept = desired
            .iter()
            .filter(|n| current.contains(n))
            .cloned()
            .collect();

        let mut renamed = Vec::new();
        let mut i = 0;
        while i < removed.len() {
            match added.iter().position(|a| a.same_target(&removed[i])) {
                Some(j) => {
                    let old = removed.remove(i);
                    let new = added.remove(j);
                    renamed.push((old, new));
                },
                None => i += 1,
            }
        }

        Self {
            kept,
            renamed,
            removed,
            added,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty() && self.removed.is_empty() && self.added.is_empty()
    }
}

pub struct ConnectionPool {
    store: Arc<ConfigStore>,
    connector: Arc<dyn LinkConnector>,
    state: Mutex<PoolState>,
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl ConnectionPool {
    pub fn new(store: Arc<ConfigStore>, connector: Arc<dyn LinkConnector>) -> Self {
        Self {
            store,
            connector,
            state: Mutex::new(PoolState::default()),
            connections: RwLock::new(Vec::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Activate the pool and bring connections in line with the store.
    pub fn start(&self) {
        self.state.lock().active = true;
        info!("connection pool started");
        self.migrate();
    }

    /// Deactivate the pool, stopping and joining every connection.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.active = false;
        state.checkpoint.clear();

        let connections = std::mem::take(&mut *self.connections.write());
        for conn in &connections {
            conn.stop();
        }
        for conn in &connections {
            conn.join();
        }
        info!(stopped = connections.len(), "connection pool stopped");
    }

    /// Reconcile against the store's committed snapshot.
    ///
    /// The snapshot is read under the pool lock so a commit racing with this
    /// call is always applied after it.
    pub fn migrate(&self) {
        let mut state = self.state.lock();
        let config = self.store.snapshot();
        self.reconcile(&mut state, &config);
    }

    /// Reconcile against `config`. No-op while the pool is inactive.
    pub fn migrate_to(&self, config: &RelayConfig) {
        let mut state = self.state.lock();
        self.reconcile(&mut state, config);
    }

    fn reconcile(&self, state: &mut PoolState, config: &RelayConfig) {
        if !state.active {
            return;
        }

        // Connections whose worker has exited are reopened if still wanted.
        let dead = self.take_dead();
        if !dead.is_empty() {
            state
                .checkpoint
                .retain(|n| !dead.iter().any(|name| n.name_eq(name)));
        }

        let diff = NetworkDiff::between(&state.checkpoint, &config.networks);
        if diff.is_empty() {
            debug!("networks unchanged, nothing to migrate");
        }

        let stopping: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write();
            let (stopping, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut *connections)
                .into_iter()
                .partition(|c| diff.removed.iter().any(|n| n.name == c.name()));
            *connections = keep;
            stopping
        };
        for conn in &stopping {
            info!(network = %conn.name(), "stopping connection");
            conn.stop();
        }
        for conn in &stopping {
            conn.join();
        }

        for network in &diff.kept {
            if let Some(conn) = self.find(&network.name) {
                conn.relabel(network.clone());
            }
        }

        // Look every connection up before relabelling any, so swapped names
        // resolve against the old labels.
        let renames: Vec<_> = diff
            .renamed
            .iter()
            .map(|(old, new)| (self.find(&old.name), new))
            .collect();
        for (conn, new) in renames {
            match conn {
                Some(conn) => conn.relabel(new.clone()),
                None => self.open(new, config),
            }
        }

        for network in &diff.added {
            self.open(network, config);
        }

        state.checkpoint = config.networks.clone();
    }

    /// Remove and join connections whose worker is no longer running,
    /// returning their network names.
    fn take_dead(&self) -> Vec<String> {
        let dead: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write();
            let (dead, live): (Vec<_>, Vec<_>) = std::mem::take(&mut *connections)
                .into_iter()
                .partition(|c| !c.is_running());
            *connections = live;
            dead
        };
        dead.iter()
            .map(|conn| {
                warn!(network = %conn.name(), "discarding exited connection");
                conn.join();
                conn.name()
            })
            .collect()
    }

    fn open(&self, network: &Network, config: &RelayConfig) {
        let conn = Arc::new(Connection::new(
            network.clone(),
            config.channels_for(&network.name),
            Arc::clone(&self.connector),
        ));
        match conn.start() {
            Ok(()) => {
                info!(network = %network.name, "started connection");
                self.connections.write().push(conn);
            },
            Err(e) => error!(network = %network.name, error = %e, "failed to start connection"),
        }
    }

    fn find(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .iter()
            .find(|c| c.network().name_eq(name))
            .cloned()
    }

    /// Queue `message` on the connection for its network.
    ///
    /// Returns `false` (and drops the message) when no such connection is
    /// active or its worker has exited.
    pub fn dispatch(&self, message: Message) -> bool {
        match self.find(message.network()) {
            Some(conn) if conn.is_running() => {
                conn.enqueue(message);
                true
            },
            Some(conn) => {
                warn!(network = %conn.name(), "connection has exited, dropping message");
                false
            },
            None => {
                warn!(network = %message.network(), "no active connection, dropping message");
                false
            },
        }
    }

    /// Names of networks with a live connection.
    pub fn active_networks(&self) -> Vec<String> {
        self.connections
            .read()
            .iter()
            .filter(|c| c.is_running())
            .map(|c| c.name())
            .collect()
    }

    pub fn connection(&self, name: &str) -> Option<Arc<Connection>> {
        self.find(name)
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("active", &self.is_active())
            .field("connections", &self.active_networks())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hookbot_config::NetworkParams};

    fn net(name: &str, host: &str, port: Option<u32>) -> Network {
        Network::new(NetworkParams {
            name: Some(name.into()),
            host: Some(host.into()),
            port,
            nick: Some("bot".into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn names(networks: &[Network]) -> Vec<&str> {
        networks.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn diff_keeps_stops_and_starts() {
        let a = net("a", "irc.a.org", None);
        let b = net("b", "irc.b.org", None);
        let c = net("c", "irc.c.org", None);
        let diff = NetworkDiff::between(&[a, b.clone()], &[b, c]);
        assert_eq!(names(&diff.kept), ["b"]);
        assert_eq!(names(&diff.removed), ["a"]);
        assert_eq!(names(&diff.added), ["c"]);
        assert!(diff.renamed.is_empty());
    }

    #[test]
    fn diff_pairs_renames_by_target() {
        let old = net("freenode", "irc.example.org", None);
        let new = net("libera", "irc.example.org", None);
        let diff = NetworkDiff::between(&[old], &[new]);
        assert_eq!(diff.renamed.len(), 1);
        assert_eq!(diff.renamed[0].1.name, "libera");
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[test]
    fn diff_port_change_is_restart() {
        let old = net("freenode", "irc.example.org", None);
        let new = net("freenode", "irc.example.org", Some(7000));
        let diff = NetworkDiff::between(&[old], &[new]);
        assert_eq!(names(&diff.removed), ["freenode"]);
        assert_eq!(names(&diff.added), ["freenode"]);
    }

    #[test]
    fn identical_sets_are_empty_diff() {
        let a = net("a", "irc.a.org", None);
        assert!(NetworkDiff::between(&[a.clone()], &[a]).is_empty());
    }
}
