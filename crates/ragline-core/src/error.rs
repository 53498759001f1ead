use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Unsupported by this model: {0}")]
    Unsupported(&'static str),

    #[error("Rerank requested but no reranker was provided")]
    RerankerMissing,
}

pub type Result<T> = std::result::Result<T, Error>;
