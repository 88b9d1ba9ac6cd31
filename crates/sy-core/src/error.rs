//! Error types for the Switchyard engine

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid rack connection")]
    InvalidRackConnection,

    #[error("Failed to find connection")]
    ConnectionNotFound,

    #[error("Graph rejected connection: {0}")]
    Graph(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Engine is not ready")]
    NotReady,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Unsupported operation")]
    Unsupported,
}

/// Result type alias
pub type EngineResult<T> = Result<T, EngineError>;
