//! Error types for clustering, caching and rendering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// A named marker collection was registered twice.
    #[error("Collection id is not unique: {0}")]
    DuplicateCollection(String),

    /// A named marker collection was looked up but never created.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The thread that owns the rendering surface has stopped.
    #[error("Rendering surface is no longer running")]
    SurfaceClosed,

    #[error("Worker pool has shut down")]
    PoolClosed,

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
