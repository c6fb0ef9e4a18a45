use thiserror::Error;

/// Result type for fsreport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fsreport operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors, including malformed exclusion rules
    #[error("Configuration error: {0}")]
    Config(String),

    /// File watching and watch registration errors
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Errors raised while delivering an event to the reporting endpoint
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Creates a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether this is a configuration error (fatal at startup)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
