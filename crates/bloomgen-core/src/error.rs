use thiserror::Error;

use crate::config_manager::ConfigError;

#[derive(Error, Debug)]
pub enum BloomError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {message} (query: {query})")]
    Query { query: String, message: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema violation at {field}: {message}")]
    SchemaViolation { field: String, message: String },
}

impl BloomError {
    pub fn query(query: impl Into<String>, message: impl ToString) -> Self {
        BloomError::Query {
            query: query.into(),
            message: message.to_string(),
        }
    }

    pub fn violation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BloomError::SchemaViolation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ConfigError> for BloomError {
    fn from(err: ConfigError) -> Self {
        BloomError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BloomError>;
