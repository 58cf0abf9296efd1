use hookbot_config::Channel;

/// Rendered text bound for one channel on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    channel: Channel,
    lines: Vec<String>,
}

impl Message {
    /// Build a message for `channel`. Empty lines are dropped.
    pub fn new(channel: Channel, lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            channel,
            lines: lines.into_iter().filter(|l| !l.trim().is_empty()).collect(),
        }
    }

    /// Name of the network the message is delivered on.
    pub fn network(&self) -> &str {
        &self.channel.network
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
