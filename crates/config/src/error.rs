/// Crate-wide result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the configuration store and its managers.
///
/// Every variant unwinds out of a transaction boundary and rolls the
/// transaction back.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A field failed sanitization during a mutation.
    #[error("{0}")]
    Validation(String),

    /// The durable configuration is unreadable or structurally wrong.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An operator command referenced a missing or duplicate name.
    #[error("{0}")]
    Command(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Whether this error was caused by operator input rather than I/O.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Command(_))
    }
}

impl hookbot_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Configuration(message)
    }
}

hookbot_common::impl_context!();
