//! Shared error types for the order migration system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid store endpoint: {input}")]
    InvalidEndpoint { input: String },

    #[error("Invalid identifier: {input}")]
    InvalidIdentifier { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Invalid outcome status: {value}")]
    InvalidStatus { value: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
