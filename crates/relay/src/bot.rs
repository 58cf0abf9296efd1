//! Composition root: the config store, the connection pool and the control
//! channel, started and stopped together.
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use {
    crossbeam::select,
    parking_lot::Mutex,
    tracing::{error, info, warn},
};

use hookbot_config::{ConfigStore, Route};

use crate::{
    control::{ControlChannel, ControlHandler},
    error::Result,
    link::LinkConnector,
    message::Message,
    pool::ConnectionPool,
    thread::{StopHandle, StopSignal, stop_pair},
};

pub struct Core {
    this: Weak<Core>,
    store: Arc<ConfigStore>,
    pool: Arc<ConnectionPool>,
    control: ControlChannel,
    stopping: AtomicBool,
    shutdown: Mutex<StopHandle>,
    shutdown_signal: StopSignal,
}

impl Core {
    /// Wire a core around `store`. Committed transactions migrate the pool
    /// from then on.
    pub fn new(
        store: Arc<ConfigStore>,
        connector: Arc<dyn LinkConnector>,
        pipe: impl Into<PathBuf>,
    ) -> Arc<Self> {
        let pool = Arc::new(ConnectionPool::new(Arc::clone(&store), connector));
        let hook = Arc::downgrade(&pool);
        store.set_on_migrate(move |config| {
            if let Some(pool) = hook.upgrade() {
                pool.migrate_to(config);
            }
        });

        let pipe = pipe.into();
        let (shutdown, shutdown_signal) = stop_pair();
        Arc::new_cyclic(|this: &Weak<Core>| {
            let handler: Weak<dyn ControlHandler> = this.clone();
            Self {
                this: this.clone(),
                store,
                pool,
                control: ControlChannel::new(pipe, handler),
                stopping: AtomicBool::new(false),
                shutdown: Mutex::new(shutdown),
                shutdown_signal,
            }
        })
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn control_pipe(&self) -> &Path {
        self.control.pipe()
    }

    /// Start the control channel, then the pool.
    pub fn start(&self) -> Result<()> {
        self.control.start()?;
        self.pool.start();
        info!(networks = self.pool.active_networks().len(), "core started");
        Ok(())
    }

    /// Stop the control channel, then the pool, and release [`Core::join`].
    /// Safe to call more than once.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("core stopping");
        self.control.stop();
        self.pool.stop();
        self.shutdown.lock().stop();
        info!("core stopped");
    }

    /// Block until the core is stopped. If the control channel dies on its
    /// own, everything else is stopped too.
    pub fn join(&self) {
        let exited = self.control.exited();
        select! {
            recv(self.shutdown_signal.receiver()) -> _ => {},
            recv(exited) -> _ => {
                if !self.stopping.load(Ordering::SeqCst) {
                    warn!("control channel exited unexpectedly, shutting down");
                }
                self.stop();
            },
        }
        self.control.join();
    }

    /// Queue `lines` for every channel of `route`. Returns how many channels
    /// had an active connection.
    pub fn dispatch(&self, route: &Route, lines: &[String]) -> usize {
        let mut delivered = 0;
        for channel in &route.channels {
            let message = Message::new(channel.clone(), lines.iter().cloned());
            if !message.is_empty() && self.pool.dispatch(message) {
                delivered += 1;
            }
        }
        delivered
    }
}

impl ControlHandler for Core {
    fn rehash(&self) -> Result<()> {
        self.store.reload()?;
        Ok(())
    }

    fn shutdown(&self) {
        let Some(core) = self.this.upgrade() else {
            return;
        };
        let spawned = thread::Builder::new()
            .name("shutdown".into())
            .spawn(move || core.stop());
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn shutdown thread");
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.store.clear_on_migrate();
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("store", &self.store)
            .field("pool", &self.pool)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}
