//! cloudsync: keeps a local SQLite mirror of cloud resource inventories.
//!
//! Each resource type implements [`sync::SyncResource`]; a
//! [`sync::Reconciler`] lists the cloud view through a
//! [`adaptor::CloudAdaptor`], lists the store view through a
//! [`cloudsync_dal::StoreWriter`], diffs them and applies the difference.

pub mod adaptor;
pub mod audit;
pub mod config;
pub mod diff;
pub mod error;
pub mod resources;
pub mod scope;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testutil;

pub use adaptor::{CloudAdaptor, InventoryAdaptor};
pub use audit::Audited;
pub use config::SyncConfig;
pub use diff::{DiffResult, diff};
pub use error::{ErrorKind, Result, StoreOp, SyncError};
pub use scope::{SyncScope, Vendor};
pub use store::Store;
pub use sync::{Phase, PhaseOrder, Reconcile, Reconciler, SyncResource, SyncResult};
