//! The transactional configuration store.
//!
//! All mutations run through [`ConfigStore::transaction`], which serializes
//! writers, works on a private copy of the committed snapshot and only
//! publishes it once it has been written to disk. Readers see the last
//! committed snapshot without ever waiting on a writer.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    parking_lot::{Mutex, RwLock},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    loader,
    schema::{Network, RelayConfig, Route},
};

/// Invoked after every committed transaction with the new snapshot.
pub type MigrateCallback = Box<dyn Fn(&Arc<RelayConfig>) + Send + Sync>;

pub struct ConfigStore {
    path: PathBuf,
    txn: Mutex<()>,
    state: RwLock<Arc<RelayConfig>>,
    on_migrate: RwLock<Option<MigrateCallback>>,
}

impl ConfigStore {
    /// Open the store backed by `path`.
    ///
    /// A missing file is created empty straight away, including its parent
    /// directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = match loader::load(&path)? {
            Some(config) => {
                debug!(path = %path.display(), networks = config.networks.len(), routes = config.routes.len(), "loaded config");
                config
            },
            None => {
                info!(path = %path.display(), "config file not found, creating an empty one");
                let config = RelayConfig::default();
                loader::save(&path, &config)?;
                config
            },
        };
        Ok(Self {
            path,
            txn: Mutex::new(()),
            state: RwLock::new(Arc::new(config)),
            on_migrate: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register the callback run after each commit, replacing any previous
    /// one.
    pub fn set_on_migrate(&self, callback: impl Fn(&Arc<RelayConfig>) + Send + Sync + 'static) {
        *self.on_migrate.write() = Some(Box::new(callback));
    }

    /// Remove the commit callback.
    pub fn clear_on_migrate(&self) {
        *self.on_migrate.write() = None;
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        Arc::clone(&self.state.read())
    }

    pub fn networks(&self) -> Vec<Network> {
        self.snapshot().networks.clone()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.snapshot().routes.clone()
    }

    /// Run `mutator` against a working copy of the configuration and commit
    /// it if it succeeds.
    ///
    /// On `Err` the working copy is dropped and nothing changes. On `Ok` the
    /// copy is pruned of orphaned channels, written to disk, published and
    /// handed to the commit callback, all before the next transaction can
    /// start. A failed write leaves the committed state untouched.
    ///
    /// Transactions do not nest: calling this from inside `mutator` or from
    /// the commit callback deadlocks.
    pub fn transaction<T>(&self, mutator: impl FnOnce(&mut RelayConfig) -> Result<T>) -> Result<T> {
        let _guard = self.txn.lock();

        let mut working = RelayConfig::clone(&self.snapshot());
        let value = mutator(&mut working)?;

        let pruned = working.prune_orphans();
        if pruned > 0 {
            debug!(pruned, "pruned orphaned channels");
        }

        loader::save(&self.path, &working)?;
        let committed = Arc::new(working);
        *self.state.write() = Arc::clone(&committed);

        if let Some(callback) = self.on_migrate.read().as_ref() {
            callback(&committed);
        }
        Ok(value)
    }

    /// Replace the in-memory state with the file's current content.
    ///
    /// A malformed or missing file fails and keeps the prior state.
    pub fn reload(&self) -> Result<()> {
        self.transaction(|config| {
            let Some(fresh) = loader::load(&self.path)? else {
                warn!(path = %self.path.display(), "config file vanished, keeping current state");
                return Err(Error::configuration(format!(
                    "{} does not exist",
                    self.path.display()
                )));
            };
            *config = fresh;
            Ok(())
        })?;
        info!(path = %self.path.display(), "config reloaded");
        Ok(())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
