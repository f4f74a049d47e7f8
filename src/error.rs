use thiserror::Error;

use crate::database::vector_db::VectorDBError;

/// Crate-wide error type. Every layer surfaces through this so the
/// presentation boundary handles extraction, embedding, store and
/// generation failures identically.
#[derive(Error, Debug)]
pub enum QaError {
    #[error("Extraction error: {0}")]
    Extraction(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Vector store error: {0}")]
    Store(#[from] VectorDBError),
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
