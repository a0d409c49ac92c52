use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PhotoResult<T> = Result<T, PhotoError>;
