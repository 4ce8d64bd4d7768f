//! Reconciliation driver.
//!
//! One pass for one resource type and scope: list the cloud view, list the
//! store view, diff, then apply deletes, creates and updates in bounded
//! batches. Deletes are re-checked against a second cloud listing first.
//! Any failure aborts the rest of the pass; already applied batches stay
//! applied and the next pass converges.

use std::borrow::Cow;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use cloudsync_dal::{AtomRule, DalError, Expression, Operator, StoreWriter, Table, TableManager};
use serde::Serialize;

use crate::adaptor::CloudAdaptor;
use crate::config::SyncConfig;
use crate::diff::{DiffResult, diff};
use crate::error::{Result, StoreOp, SyncError};
use crate::scope::{SyncScope, Vendor};

/// Apply phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Delete,
    Create,
    Update,
}

/// Fixed order in which a resource type applies its phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOrder {
    /// For types whose cloud identifiers can be reused: clear stale rows
    /// before inserting new ones.
    DeleteCreateUpdate,
    /// For types whose cloud identifiers are never reused: refresh existing
    /// rows before inserting new ones.
    DeleteUpdateCreate,
}

impl PhaseOrder {
    pub fn phases(self) -> [Phase; 3] {
        match self {
            PhaseOrder::DeleteCreateUpdate => [Phase::Delete, Phase::Create, Phase::Update],
            PhaseOrder::DeleteUpdateCreate => [Phase::Delete, Phase::Update, Phase::Create],
        }
    }
}

/// A resource type that can be reconciled: its two views and how they map
/// onto each other.
pub trait SyncResource: Send + Sync + 'static {
    /// Resource type name, used in errors and logs.
    const NAME: &'static str;
    const VENDOR: Vendor;
    const PHASE_ORDER: PhaseOrder;
    /// Store column holding the cloud identifier.
    const CLOUD_ID_FIELD: &'static str;
    /// Whether rows are owned per region. Account-wide types ignore the
    /// region of a scope.
    const REGIONAL: bool = false;

    /// Record as returned by the provider.
    type Cloud: Send + Sync + 'static;
    /// Record as persisted.
    type Row: Table + Clone;

    fn cloud_id(cloud: &Self::Cloud) -> &str;
    fn row_id(row: &Self::Row) -> &str;
    fn row_cloud_id(row: &Self::Row) -> &str;

    /// Whether the stored row lags behind the cloud record. Pure.
    fn is_changed(cloud: &Self::Cloud, row: &Self::Row) -> bool;

    /// Store filter selecting every row owned by `scope`. Never empty.
    fn scope_filter(scope: &SyncScope) -> Expression;

    /// Columns written on insert; empty means all.
    fn insert_fields() -> &'static [&'static str] {
        &[]
    }

    /// Columns written on update.
    fn update_fields() -> &'static [&'static str];

    fn to_create(scope: &SyncScope, cloud: &Self::Cloud) -> Result<Self::Row>;
    fn to_update(scope: &SyncScope, id: &str, cloud: &Self::Cloud) -> Result<Self::Row>;

    /// Validated table manager for this type's row.
    fn table_manager() -> Result<TableManager<Self::Row>> {
        TableManager::new(Self::insert_fields(), Self::update_fields()).map_err(|source| {
            SyncError::Config {
                resource: Self::NAME,
                source,
            }
        })
    }
}

/// What one pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Surrogate keys of inserted rows.
    pub created_ids: Vec<String>,
    pub updated: usize,
    pub deleted: u64,
}

impl SyncResult {
    pub fn is_noop(&self) -> bool {
        self.created_ids.is_empty() && self.updated == 0 && self.deleted == 0
    }
}

/// Object-safe handle on a reconciler of any resource type.
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn resource(&self) -> &'static str;

    async fn reconcile(&self, scope: &SyncScope) -> Result<SyncResult>;
}

/// Reconciler of resource type `R`.
pub struct Reconciler<R: SyncResource> {
    adaptor: Arc<dyn CloudAdaptor<R::Cloud>>,
    store: Arc<dyn StoreWriter<R::Row>>,
    config: SyncConfig,
    _marker: PhantomData<fn() -> R>,
}

impl<R: SyncResource> Reconciler<R> {
    /// Fails on an invalid config or a row schema that disagrees with the
    /// declared insert/update fields.
    pub fn new(
        adaptor: Arc<dyn CloudAdaptor<R::Cloud>>,
        store: Arc<dyn StoreWriter<R::Row>>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        R::table_manager()?;
        Ok(Self {
            adaptor,
            store,
            config,
            _marker: PhantomData,
        })
    }

    fn store_err(
        scope: &SyncScope,
        op: StoreOp,
        cloud_ids: Vec<String>,
    ) -> impl FnOnce(DalError) -> SyncError + '_ {
        move |source| SyncError::Store {
            resource: R::NAME,
            scope: scope.clone(),
            op,
            cloud_ids,
            source,
        }
    }

    fn batch_cloud_ids(rows: &[R::Row]) -> Vec<String> {
        rows.iter().map(|row| R::row_cloud_id(row).to_string()).collect()
    }

    async fn list_from_cloud(&self, scope: &SyncScope) -> Result<Vec<R::Cloud>> {
        self.adaptor
            .list_resources(scope)
            .await
            .map_err(|source| SyncError::Cloud {
                resource: R::NAME,
                scope: scope.clone(),
                source,
            })
    }

    async fn list_from_store(&self, scope: &SyncScope) -> Result<Vec<R::Row>> {
        cloudsync_dal::list_all(
            self.store.as_ref(),
            &R::scope_filter(scope),
            self.config.page_size,
        )
        .await
        .map_err(Self::store_err(scope, StoreOp::List, Vec::new()))
    }

    async fn delete(&self, scope: &SyncScope, cloud_ids: &[String]) -> Result<u64> {
        // Listing races: anything that came back since the first fetch
        // must not be deleted.
        let latest = self.list_from_cloud(scope).await?;
        let candidates: HashSet<&str> = cloud_ids.iter().map(String::as_str).collect();
        let reappeared: Vec<String> = latest
            .iter()
            .map(R::cloud_id)
            .filter(|id| candidates.contains(id))
            .map(str::to_string)
            .collect();
        if !reappeared.is_empty() {
            return Err(SyncError::Consistency {
                resource: R::NAME,
                scope: scope.clone(),
                cloud_ids: reappeared,
            });
        }

        let mut deleted = 0;
        for batch in cloud_ids.chunks(self.config.max_batch) {
            let filter = Expression::and(vec![
                R::scope_filter(scope).into(),
                AtomRule::new(R::CLOUD_ID_FIELD, Operator::In, batch.to_vec()).into(),
            ]);
            deleted += self
                .store
                .batch_delete(&filter)
                .await
                .map_err(Self::store_err(scope, StoreOp::Delete, batch.to_vec()))?;
        }
        Ok(deleted)
    }

    async fn create(&self, scope: &SyncScope, to_create: &[R::Cloud]) -> Result<Vec<String>> {
        let rows = to_create
            .iter()
            .map(|one| R::to_create(scope, one))
            .collect::<Result<Vec<_>>>()?;

        let mut ids = Vec::with_capacity(rows.len());
        for batch in rows.chunks(self.config.max_batch) {
            let created = self
                .store
                .batch_create(batch)
                .await
                .map_err(Self::store_err(
                    scope,
                    StoreOp::Create,
                    Self::batch_cloud_ids(batch),
                ))?;
            ids.extend(created);
        }
        Ok(ids)
    }

    async fn update<'a>(
        &self,
        scope: &SyncScope,
        to_update: impl Iterator<Item = (&'a String, &'a R::Cloud)>,
    ) -> Result<usize> {
        let rows = to_update
            .map(|(id, one)| R::to_update(scope, id, one))
            .collect::<Result<Vec<_>>>()?;

        for batch in rows.chunks(self.config.max_batch) {
            self.store
                .batch_update(batch)
                .await
                .map_err(Self::store_err(
                    scope,
                    StoreOp::Update,
                    Self::batch_cloud_ids(batch),
                ))?;
        }
        Ok(rows.len())
    }

    /// Diff the two views of `scope` without writing anything.
    pub async fn plan(&self, scope: &SyncScope) -> Result<DiffResult<R::Cloud>> {
        let scope = self.resolve_scope(scope)?;
        self.diff_views(&scope).await
    }

    async fn diff_views(&self, scope: &SyncScope) -> Result<DiffResult<R::Cloud>> {
        let cloud = self.list_from_cloud(scope).await?;
        let rows = self.list_from_store(scope).await?;

        Ok(diff(
            cloud,
            &rows,
            R::cloud_id,
            |row: &R::Row| (R::row_id(row), R::row_cloud_id(row)),
            R::is_changed,
        ))
    }

    /// Validates `scope` and drops its region for account-wide types, so
    /// a regional pass neither lists nor deletes beyond what it owns.
    fn resolve_scope<'a>(&self, scope: &'a SyncScope) -> Result<Cow<'a, SyncScope>> {
        scope.validate()?;
        if scope.vendor != R::VENDOR {
            return Err(SyncError::InvalidParameter(format!(
                "{} cannot reconcile vendor {}",
                R::NAME,
                scope.vendor
            )));
        }
        if R::REGIONAL || scope.region.is_none() {
            return Ok(Cow::Borrowed(scope));
        }
        let mut account_wide = scope.clone();
        account_wide.region = None;
        Ok(Cow::Owned(account_wide))
    }
}

#[async_trait]
impl<R: SyncResource> Reconcile for Reconciler<R> {
    fn resource(&self) -> &'static str {
        R::NAME
    }

    async fn reconcile(&self, scope: &SyncScope) -> Result<SyncResult> {
        let scope = self.resolve_scope(scope)?;
        let scope = scope.as_ref();
        let plan = self.diff_views(scope).await?;
        let mut result = SyncResult::default();
        if plan.is_empty() {
            return Ok(result);
        }

        for phase in R::PHASE_ORDER.phases() {
            match phase {
                Phase::Delete if !plan.to_delete_cloud_ids.is_empty() => {
                    result.deleted = self.delete(scope, &plan.to_delete_cloud_ids).await?;
                }
                Phase::Create if !plan.to_create.is_empty() => {
                    result.created_ids = self.create(scope, &plan.to_create).await?;
                }
                Phase::Update if !plan.to_update.is_empty() => {
                    result.updated = self.update(scope, plan.to_update.iter()).await?;
                }
                _ => {}
            }
        }

        Ok(result)
    }
}
