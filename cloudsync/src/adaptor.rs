//! Cloud adaptor boundary.
//!
//! Provider SDK clients live outside this crate; the reconciler only needs
//! a complete listing of one resource type for one scope.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::scope::SyncScope;

/// Lists the cloud view of one resource type.
#[async_trait]
pub trait CloudAdaptor<C>: Send + Sync {
    /// Every resource in `scope`. Provider paging is the adaptor's concern.
    async fn list_resources(&self, scope: &SyncScope) -> Result<Vec<C>>;
}

/// Adaptor backed by a JSON inventory file, re-read on every call.
///
/// Layout: `{ "<account>[/<region>]": { "<resource>": [ ... ] } }`. A
/// missing account or resource lists as empty.
pub struct InventoryAdaptor<C> {
    path: PathBuf,
    resource: &'static str,
    _marker: PhantomData<fn() -> C>,
}

impl<C> InventoryAdaptor<C> {
    pub fn new(path: impl Into<PathBuf>, resource: &'static str) -> Self {
        Self {
            path: path.into(),
            resource,
            _marker: PhantomData,
        }
    }
}

fn inventory_key(scope: &SyncScope) -> String {
    match &scope.region {
        Some(region) => format!("{}/{}", scope.account_id, region),
        None => scope.account_id.clone(),
    }
}

#[async_trait]
impl<C> CloudAdaptor<C> for InventoryAdaptor<C>
where
    C: DeserializeOwned + Send + 'static,
{
    async fn list_resources(&self, scope: &SyncScope) -> Result<Vec<C>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read inventory {}", self.path.display()))?;

        let mut inventory: HashMap<String, HashMap<String, serde_json::Value>> =
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid inventory {}", self.path.display()))?;

        let listing = inventory
            .remove(&inventory_key(scope))
            .and_then(|mut resources| resources.remove(self.resource));

        match listing {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("Invalid {} listing for {}", self.resource, scope)),
            None => Ok(Vec::new()),
        }
    }
}
