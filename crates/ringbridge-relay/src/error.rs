/// Errors that can stop the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ringbridge_transport::TransportError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON configuration could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A relay thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// A relay thread panicked.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, RelayError>;
