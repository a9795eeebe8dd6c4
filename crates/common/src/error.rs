//! Common error types

use crate::channel::AttributeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Attribute error: {0}")]
    Attribute(#[from] AttributeError),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
