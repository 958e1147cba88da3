use crate::config::ConfigError;

/// Errors raised by a transport while declaring or publishing on a channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to declare channel '{channel}': {reason}")]
    Declare { channel: String, reason: String },

    #[error("Failed to publish on '{channel}': {reason}")]
    Publish { channel: String, reason: String },
}

/// Node-level errors. Only startup can fail; running workers never do.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to initialize camera {index} ({label})")]
    CameraInit { index: usize, label: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Zenoh error: {0}")]
    Zenoh(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
