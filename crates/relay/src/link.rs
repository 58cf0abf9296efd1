//! The seam between delivery queues and the wire protocol.
//!
//! A [`LinkConnector`] opens a [`Link`] for one network. The link reports
//! through a [`ReadySignal`] once it is registered and able to deliver; the
//! connection worker buffers messages until then.
use crossbeam::channel::{self, Receiver, Sender};

use hookbot_config::{Channel, Network};

use crate::error::Result;

/// What a link needs to know to come up.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub network: Network,
    /// Channels to join after registration.
    pub channels: Vec<Channel>,
}

/// Fired by a link once it can deliver messages.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Sender<()>,
}

impl ReadySignal {
    /// Mark the link ready. Extra calls are ignored.
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Create a ready signal and the receiver the worker waits on.
///
/// The receiver disconnects without a value when every clone of the signal
/// is dropped before firing, which means the link gave up.
pub fn ready_pair() -> (ReadySignal, Receiver<()>) {
    let (tx, rx) = channel::bounded(1);
    (ReadySignal { tx }, rx)
}

/// An open connection to one network.
pub trait Link: Send {
    /// Deliver one line of text to `channel`.
    fn send(&mut self, channel: &Channel, text: &str) -> Result<()>;

    /// Close the connection. Must be safe to call more than once.
    fn disconnect(&mut self);

    /// Whether the link has gone away on its own and can no longer deliver.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Opens links. Shared by every connection in the pool.
pub trait LinkConnector: Send + Sync {
    fn connect(&self, spec: LinkSpec, ready: ReadySignal) -> Result<Box<dyn Link>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_fires_once() {
        let (ready, rx) = ready_pair();
        ready.signal();
        ready.signal();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_signal_disconnects() {
        let (ready, rx) = ready_pair();
        drop(ready);
        assert!(rx.recv().is_err());
    }
}
