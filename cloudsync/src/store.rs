//! SQLite store: opens `metadata.db` and creates the inventory tables.

use std::path::Path;

use anyhow::Result;
use cloudsync_dal::Dao;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::sync::SyncResource;

/// SQLite database holding the mirrored inventories.
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("metadata.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS region (
                id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(16)))),
                vendor TEXT NOT NULL,
                account_id TEXT NOT NULL,
                region_id TEXT NOT NULL,
                region_name TEXT NOT NULL,
                status TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (vendor, account_id, region_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS security_group (
                id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(16)))),
                vendor TEXT NOT NULL,
                account_id TEXT NOT NULL,
                cloud_id TEXT NOT NULL,
                bk_biz_id INTEGER NOT NULL DEFAULT -1,
                region TEXT NOT NULL,
                name TEXT NOT NULL,
                memo TEXT,
                extension TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (vendor, account_id, cloud_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gcp_firewall_rule (
                id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(16)))),
                vendor TEXT NOT NULL,
                account_id TEXT NOT NULL,
                cloud_id TEXT NOT NULL,
                name TEXT NOT NULL,
                memo TEXT NOT NULL DEFAULT '',
                network TEXT NOT NULL,
                priority INTEGER NOT NULL,
                direction TEXT NOT NULL,
                source_ranges TEXT NOT NULL DEFAULT '[]',
                destination_ranges TEXT NOT NULL DEFAULT '[]',
                target_tags TEXT NOT NULL DEFAULT '[]',
                allowed TEXT NOT NULL DEFAULT '[]',
                denied TEXT NOT NULL DEFAULT '[]',
                disabled INTEGER NOT NULL DEFAULT 0,
                self_link TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (vendor, account_id, cloud_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store writer for resource type `R`.
    pub fn dao<R: SyncResource>(&self) -> crate::error::Result<Dao<R::Row>> {
        Ok(Dao::new(self.pool.clone(), R::table_manager()?))
    }
}

#[cfg(test)]
mod tests {
    use cloudsync_dal::{BasePage, Expression, StoreWriter};
    use tempfile::TempDir;

    use super::*;
    use crate::resources::firewall_rule::{FirewallRuleTable, GcpFirewallRule, GcpFirewallRuleSync};
    use crate::resources::region::{AwsRegion, AwsRegionSync};
    use crate::resources::security_group::{AzureSecurityGroup, AzureSecurityGroupSync};
    use crate::scope::{SyncScope, Vendor};

    async fn setup_store() -> (Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).await.unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).await.unwrap();
        store.migrate().await.unwrap();
        drop(store);
        Store::new(tmp.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_region_rows_round_trip() {
        let (store, _tmp) = setup_store().await;
        let dao = store.dao::<AwsRegionSync>().unwrap();
        let scope = SyncScope::new(Vendor::Aws, "acc-1");
        let cloud = AwsRegion {
            region_id: "us-east-1".to_string(),
            region_name: "US East (N. Virginia)".to_string(),
            region_state: "opt-in-not-required".to_string(),
            endpoint: "ec2.us-east-1.amazonaws.com".to_string(),
        };

        let row = AwsRegionSync::to_create(&scope, &cloud).unwrap();
        let ids = dao.batch_create(&[row]).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].len(), 32);

        let rows = dao
            .list(&AwsRegionSync::scope_filter(&scope), &BasePage::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ids[0]);
        assert!(!AwsRegionSync::is_changed(&cloud, &rows[0]));
    }

    #[tokio::test]
    async fn test_security_group_null_memo() {
        let (store, _tmp) = setup_store().await;
        let dao = store.dao::<AzureSecurityGroupSync>().unwrap();
        let scope = SyncScope::new(Vendor::Azure, "sub-1");
        let cloud = AzureSecurityGroup {
            id: "/subscriptions/sub-1/nsg/web".to_string(),
            name: "web".to_string(),
            location: "westeurope".to_string(),
            resource_group_name: "rg".to_string(),
            etag: None,
            resource_guid: None,
            provisioning_state: None,
        };

        let row = AzureSecurityGroupSync::to_create(&scope, &cloud).unwrap();
        dao.batch_create(&[row]).await.unwrap();
        let rows = dao
            .list(&Expression::all(), &BasePage::default())
            .await
            .unwrap();
        assert_eq!(rows[0].memo, None);
        assert_eq!(rows[0].bk_biz_id, -1);
        assert!(!AzureSecurityGroupSync::is_changed(&cloud, &rows[0]));
    }

    #[tokio::test]
    async fn test_firewall_rule_unique_per_account() {
        let (store, _tmp) = setup_store().await;
        let dao = store.dao::<GcpFirewallRuleSync>().unwrap();
        let scope = SyncScope::new(Vendor::Gcp, "project-1");
        let cloud: GcpFirewallRule = serde_json::from_str(
            r#"{"id": "1", "name": "deny-all", "network": "default",
                "priority": 65534, "direction": "INGRESS",
                "denied": [{"IPProtocol": "all"}], "disabled": true}"#,
        )
        .unwrap();

        let row: FirewallRuleTable = GcpFirewallRuleSync::to_create(&scope, &cloud).unwrap();
        dao.batch_create(std::slice::from_ref(&row)).await.unwrap();
        assert!(dao.batch_create(&[row]).await.is_err());

        let rows = dao
            .list(&Expression::all(), &BasePage::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].disabled);
        assert!(!GcpFirewallRuleSync::is_changed(&cloud, &rows[0]));
    }
}
