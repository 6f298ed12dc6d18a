//! Error types and result aliases for vislens.
//!
//! This module defines the core error type [`VislensError`] and the [`Result`] type alias
//! used throughout the library. Remote and I/O failures travel as `Result<T>` until the
//! conversation controller absorbs them into user-facing turns.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VislensError {
    #[error("LLM gateway error: {0}")]
    GatewayError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Another operation is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, VislensError>;
