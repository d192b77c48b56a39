//! Error types for the Roost data layer

use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Cache error: {0}")]
    Cache(String),

    /// A batched fetch failed; every caller coalesced into that window
    /// receives a clone of this same error.
    #[error(transparent)]
    Batch(#[from] Arc<Error>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True when the error originated from a rejected loader batch.
    pub fn is_batch(&self) -> bool {
        matches!(self, Error::Batch(_))
    }
}
