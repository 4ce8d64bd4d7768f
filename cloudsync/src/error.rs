//! Reconciliation error types.

use std::fmt;

use cloudsync_dal::DalError;
use thiserror::Error;

use crate::scope::SyncScope;

/// Store call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreOp::List => "list",
            StoreOp::Create => "create",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Coarse classification of a failure, for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameter,
    Configuration,
    UpstreamCloud,
    Store,
    Consistency,
}

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or missing option, caught before any network call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Schema and declared field lists disagree.
    #[error("{resource} misconfigured: {source}")]
    Config {
        resource: &'static str,
        #[source]
        source: DalError,
    },

    /// Listing from the cloud provider failed.
    #[error("list {resource} from cloud failed, scope: {scope}: {source}")]
    Cloud {
        resource: &'static str,
        scope: SyncScope,
        #[source]
        source: anyhow::Error,
    },

    /// A store read or write failed. `cloud_ids` names the batch a write
    /// was applying; it is empty for reads.
    #[error(
        "{op} {resource} in store failed, scope: {scope}, cloud ids: {cloud_ids:?}: {source}"
    )]
    Store {
        resource: &'static str,
        scope: SyncScope,
        op: StoreOp,
        cloud_ids: Vec<String>,
        #[source]
        source: DalError,
    },

    /// Delete candidates showed up again in the cloud before deletion.
    #[error(
        "{resource} reappeared in cloud before delete, scope: {scope}, cloud ids: {cloud_ids:?}"
    )]
    Consistency {
        resource: &'static str,
        scope: SyncScope,
        cloud_ids: Vec<String>,
    },

    /// A cloud record could not be encoded into its store row.
    #[error("encode {resource} record: {source}")]
    Encode {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            SyncError::Config { .. } | SyncError::Encode { .. } => ErrorKind::Configuration,
            SyncError::Cloud { .. } => ErrorKind::UpstreamCloud,
            SyncError::Store { .. } => ErrorKind::Store,
            SyncError::Consistency { .. } => ErrorKind::Consistency,
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, SyncError>;
