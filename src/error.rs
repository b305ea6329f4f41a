//! Error types for the BAG ingest pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, BagError>;

/// Errors that can occur while ingesting and reconciling BAG data.
#[derive(Error, Debug)]
pub enum BagError {
    /// Entity kind name not known to the parser
    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed XML document
    #[error("XML error in {shard}: {message}")]
    Xml { shard: String, message: String },

    /// Zip archive could not be read
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Reference table could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Config file could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A parser worker failed without reporting a result
    #[error("Worker error: {0}")]
    Worker(String),
}

impl BagError {
    pub fn xml(shard: impl Into<String>, message: impl std::fmt::Display) -> Self {
        BagError::Xml {
            shard: shard.into(),
            message: message.to_string(),
        }
    }
}
