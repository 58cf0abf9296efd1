pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The running bot could not be reached over the control pipe.
    #[error("unable to communicate with the bot: {0} (is the bot running?)")]
    Communication(String),

    #[error(transparent)]
    Config(#[from] hookbot_config::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The network link failed to connect or deliver.
    #[error("link error: {0}")]
    Link(String),
}

impl Error {
    #[must_use]
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication(message.into())
    }

    #[must_use]
    pub fn link(message: impl Into<String>) -> Self {
        Self::Link(message.into())
    }
}

impl hookbot_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Communication(message)
    }
}

hookbot_common::impl_context!();
