//! [`LinkConnector`] backed by a real IRC session thread.
use std::thread::{self, JoinHandle};

use {
    crossbeam::channel::{self, Sender},
    tracing::{debug, warn},
};

use {
    hookbot_config::Channel,
    hookbot_relay::{Error, Link, LinkConnector, LinkSpec, ReadySignal, Result},
};

use crate::{
    session::{self, Outgoing},
    state::State,
    transport::Stream,
};

/// Opens one [`IrcLink`] per network.
#[derive(Debug, Default, Clone, Copy)]
pub struct IrcConnector;

impl LinkConnector for IrcConnector {
    fn connect(&self, spec: LinkSpec, ready: ReadySignal) -> Result<Box<dyn Link>> {
        let LinkSpec { network, channels } = spec;
        let name = network.name.clone();
        let stream = Stream::open(&network).map_err(|e| Error::link(format!("{e:#}")))?;

        let (tx, rx) = channel::unbounded();
        let state = State::new(network, channels);
        let handle = thread::Builder::new()
            .name(format!("irc-{name}"))
            .spawn(move || session::run(stream, state, &rx, ready))?;
        debug!(network = %name, "session started");

        Ok(Box::new(IrcLink {
            network: name,
            outbound: Some(tx),
            handle: Some(handle),
        }))
    }
}

pub struct IrcLink {
    network: String,
    outbound: Option<Sender<Outgoing>>,
    handle: Option<JoinHandle<()>>,
}

impl Link for IrcLink {
    fn send(&mut self, channel: &Channel, text: &str) -> Result<()> {
        let Some(tx) = &self.outbound else {
            return Err(Error::link(format!("{} is disconnected", self.network)));
        };
        tx.send(Outgoing::Privmsg {
            channel: channel.clone(),
            text: text.to_string(),
        })
        .map_err(|_| Error::link(format!("session for {} has ended", self.network)))
    }

    fn is_closed(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    fn disconnect(&mut self) {
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Outgoing::Quit);
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(network = %self.network, "session thread panicked");
        }
    }
}

impl Drop for IrcLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}
