//! Structured logging of reconciliation outcomes.
//!
//! Reconcilers return their outcome and never log it; wrap one in
//! [`Audited`] to emit one event per pass.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::{ErrorKind, Result};
use crate::scope::SyncScope;
use crate::sync::{Reconcile, SyncResult};

/// Logs every pass of the wrapped reconciler.
pub struct Audited<T> {
    inner: T,
}

impl<T: Reconcile> Audited<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Reconcile> Reconcile for Audited<T> {
    fn resource(&self) -> &'static str {
        self.inner.resource()
    }

    async fn reconcile(&self, scope: &SyncScope) -> Result<SyncResult> {
        let started = Instant::now();
        let result = self.inner.reconcile(scope).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let resource = self.inner.resource();
        let region = scope.region.as_deref().unwrap_or("-");
        match &result {
            Ok(r) => info!(
                resource,
                vendor = %scope.vendor,
                account = %scope.account_id,
                region,
                created = r.created_ids.len(),
                updated = r.updated,
                deleted = r.deleted,
                elapsed_ms,
                "Reconciled"
            ),
            Err(e) if e.kind() == ErrorKind::Consistency => warn!(
                resource,
                vendor = %scope.vendor,
                account = %scope.account_id,
                region,
                error = %e,
                "Delete candidates still listed in cloud, pass aborted"
            ),
            Err(e) => error!(
                resource,
                vendor = %scope.vendor,
                account = %scope.account_id,
                region,
                kind = ?e.kind(),
                error = %e,
                "Reconcile failed"
            ),
        }

        result
    }
}
