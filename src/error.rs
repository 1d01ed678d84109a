use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid metric specification: {0}")]
    InvalidSpecification(String),

    #[error("Unrecognized payload: {0}")]
    Payload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
