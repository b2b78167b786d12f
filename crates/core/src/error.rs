use std::process::ExitStatus;

/// Result alias that carries the custom [`SentinelError`] type.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Common error type for the core crate.
///
/// None of these are fatal to the daemon: the engine logs capability failures
/// and retries on the next tick, and the poll loop turns anything that escapes
/// a tick into a backoff.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// An external command ran but reported failure.
    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: ExitStatus },
    /// The visualizer process could not be launched.
    #[error("failed to spawn visualizer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// A tick, the startup blank or cleanup panicked and was caught by the
    /// poll loop.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl SentinelError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SentinelError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SentinelError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
