//! DAL error types.

use thiserror::Error;

/// Errors raised while building or executing statements.
#[derive(Debug, Error)]
pub enum DalError {
    /// Filter expression is malformed or references an unknown field.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Page options are out of range.
    #[error("invalid page: {0}")]
    InvalidPage(String),

    /// Table schema and declared field lists disagree.
    ///
    /// This is a programming error and surfaces when the table manager
    /// is registered, never in the middle of a write.
    #[error("table {table} misconfigured: {reason}")]
    Config { table: &'static str, reason: String },

    /// The database rejected a statement or the connection failed.
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

impl DalError {
    pub(crate) fn config(table: &'static str, reason: impl Into<String>) -> Self {
        DalError::Config {
            table,
            reason: reason.into(),
        }
    }
}

/// Result type for DAL operations.
pub type Result<T> = std::result::Result<T, DalError>;
