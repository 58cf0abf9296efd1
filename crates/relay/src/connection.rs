//! One outbound network connection: a FIFO queue drained by a worker thread.
use std::{io, sync::Arc};

use {
    crossbeam::{
        channel::{self, Receiver, Sender},
        select,
    },
    parking_lot::RwLock,
    tracing::{debug, error, info, warn},
};

use hookbot_config::{Channel, Network};

use crate::{
    link::{self, Link, LinkConnector, LinkSpec},
    message::Message,
    thread::{StopSignal, ThreadController},
};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Ready,
    Stopped,
}

pub struct Connection {
    network: Arc<RwLock<Network>>,
    channels: Vec<Channel>,
    connector: Arc<dyn LinkConnector>,
    queue_tx: Sender<Message>,
    queue_rx: Receiver<Message>,
    state: Arc<RwLock<ConnectionState>>,
    thread: ThreadController,
}

impl Connection {
    /// A connection to `network` that joins `channels` once registered.
    pub fn new(network: Network, channels: Vec<Channel>, connector: Arc<dyn LinkConnector>) -> Self {
        let (queue_tx, queue_rx) = channel::unbounded();
        let thread = ThreadController::new(format!("conn-{}", network.name));
        Self {
            network: Arc::new(RwLock::new(network)),
            channels,
            connector,
            queue_tx,
            queue_rx,
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            thread,
        }
    }

    /// The network record this connection currently serves.
    pub fn network(&self) -> Network {
        self.network.read().clone()
    }

    pub fn name(&self) -> String {
        self.network.read().name.clone()
    }

    /// Swap in an updated record for the same server without reconnecting.
    pub fn relabel(&self, network: Network) {
        let mut current = self.network.write();
        if current.name != network.name {
            info!(from = %current.name, to = %network.name, "connection relabelled");
        }
        *current = network;
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }

    /// Spawn the worker. No-op when it is already running.
    pub fn start(&self) -> io::Result<()> {
        let spec = LinkSpec {
            network: self.network(),
            channels: self.channels.clone(),
        };
        let worker = self.worker();
        self.thread.start(move |stop| worker.run(spec, &stop))?;
        Ok(())
    }

    fn worker(&self) -> Worker {
        Worker {
            connector: Arc::clone(&self.connector),
            label: Arc::clone(&self.network),
            queue: self.queue_rx.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Queue a message. Never blocks; messages queued before the link is
    /// ready are held until it is.
    pub fn enqueue(&self, message: Message) {
        if self.queue_tx.send(message).is_err() {
            warn!(network = %self.name(), "delivery queue closed, dropping message");
        }
    }

    /// Number of messages waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue_rx.len()
    }

    /// Ask the worker to stop. Queued messages are discarded.
    pub fn stop(&self) {
        self.thread.stop();
    }

    pub fn join(&self) {
        self.thread.join();
        while self.queue_rx.try_recv().is_ok() {}
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("network", &self.name())
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Everything the worker thread owns.
struct Worker {
    connector: Arc<dyn LinkConnector>,
    /// Shared with the [`Connection`], so renames show up in the logs.
    label: Arc<RwLock<Network>>,
    queue: Receiver<Message>,
    state: Arc<RwLock<ConnectionState>>,
}

impl Worker {
    fn name(&self) -> String {
        self.label.read().name.clone()
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.write() = next;
    }

    fn run(&self, spec: LinkSpec, stop: &StopSignal) {
        self.set_state(ConnectionState::Connecting);
        info!(network = %self.name(), host = %spec.network.host, port = spec.network.real_port(), "connecting");

        let (ready, ready_rx) = link::ready_pair();
        let mut link = match self.connector.connect(spec, ready) {
            Ok(link) => link,
            Err(e) => {
                error!(network = %self.name(), error = %e, "failed to connect");
                self.set_state(ConnectionState::Stopped);
                return;
            },
        };

        let became_ready = select! {
            recv(ready_rx) -> ready => ready.is_ok(),
            recv(stop.receiver()) -> _ => false,
        };
        if !became_ready {
            if !stop.is_stopped() {
                warn!(network = %self.name(), "link closed before becoming ready");
            }
            link.disconnect();
            self.set_state(ConnectionState::Stopped);
            return;
        }

        self.set_state(ConnectionState::Ready);
        info!(network = %self.name(), "connection ready");

        loop {
            select! {
                recv(self.queue) -> message => match message {
                    Ok(message) => {
                        if !self.deliver(link.as_mut(), &message) && link.is_closed() {
                            warn!(network = %self.name(), "link closed, worker exiting");
                            break;
                        }
                    },
                    Err(_) => break,
                },
                recv(stop.receiver()) -> _ => break,
            }
        }

        debug!(network = %self.name(), "disconnecting");
        link.disconnect();
        self.set_state(ConnectionState::Stopped);
    }

    /// Send every line of `message`, stopping at the first failure.
    fn deliver(&self, link: &mut dyn Link, message: &Message) -> bool {
        for line in message.lines() {
            if let Err(e) = link.send(message.channel(), line) {
                error!(
                    network = %self.name(),
                    channel = %message.channel().name,
                    error = %e,
                    "failed to deliver message"
                );
                return false;
            }
        }
        debug!(network = %self.name(), channel = %message.channel().name, lines = message.lines().len(), "message delivered");
        true
    }
}
