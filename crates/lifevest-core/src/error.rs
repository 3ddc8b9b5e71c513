//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("Invalid snapshot at {path}: {message}")]
    InvalidSnapshot { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Serialization { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
