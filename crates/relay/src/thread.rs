//! Named background workers with cooperative shutdown.
//!
//! A worker receives a [`StopSignal`] when it starts. Stopping drops the
//! sending half, which wakes every `select!`/`recv` on the signal at once;
//! the worker is expected to notice and return.
use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use {
    crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    parking_lot::Mutex,
    tracing::{debug, error},
};

/// Receiving side of a worker's stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: Receiver<()>,
}

/// Sending side of a [`StopSignal`]. Dropping it (or calling
/// [`StopHandle::stop`]) signals stop.
#[derive(Debug)]
pub struct StopHandle {
    tx: Option<Sender<()>>,
}

/// A fresh, unsignalled stop pair.
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = channel::bounded(0);
    (StopHandle { tx: Some(tx) }, StopSignal { rx })
}

impl StopHandle {
    pub fn stop(&mut self) {
        self.tx.take();
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel that becomes disconnected on stop, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Sleep for up to `timeout`. Returns `true` if stop was signalled.
    pub fn sleep(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop: StopHandle,
    exited: Receiver<()>,
}

/// Starts, stops and joins a single named background thread.
pub struct ThreadController {
    name: String,
    worker: Mutex<Option<Worker>>,
}

impl ThreadController {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn `body` on a new thread unless one is already running.
    ///
    /// Returns `Ok(false)` when the worker was already running.
    pub fn start<F>(&self, body: F) -> io::Result<bool>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(false);
        }

        let (stop, signal) = stop_pair();
        let (exited_tx, exited) = channel::bounded::<()>(0);
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let _exited = exited_tx;
                debug!(thread = %name, "worker started");
                body(signal);
                debug!(thread = %name, "worker finished");
            })?;

        *worker = Some(Worker {
            handle,
            stop,
            exited,
        });
        Ok(true)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Ask the worker to stop. Does not wait.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().as_mut() {
            worker.stop.stop();
        }
    }

    /// Wait for the worker to exit. No-op if it never started or was
    /// already joined.
    pub fn join(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && worker.handle.join().is_err()
        {
            error!(thread = %self.name, "worker panicked");
        }
    }

    /// A channel that disconnects once the worker exits, for any reason.
    /// Never disconnects if the worker has not been started.
    pub fn exited(&self) -> Receiver<()> {
        self.worker
            .lock()
            .as_ref()
            .map_or_else(channel::never, |w| w.exited.clone())
    }
}

impl std::fmt::Debug for ThreadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadController")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for ThreadController {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
