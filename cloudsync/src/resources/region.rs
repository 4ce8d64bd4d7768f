//! AWS regions.

use std::sync::LazyLock;

use cloudsync_dal::{Expression, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scope::{SyncScope, Vendor};
use crate::sync::{PhaseOrder, SyncResource};

/// A region as listed by EC2 `DescribeRegions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsRegion {
    pub region_id: String,
    pub region_name: String,
    pub region_state: String,
    pub endpoint: String,
}

/// Row of the `region` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RegionTable {
    pub id: String,
    pub vendor: String,
    pub account_id: String,
    pub region_id: String,
    pub region_name: String,
    pub status: String,
    pub endpoint: String,
    pub created_at: String,
    pub updated_at: String,
}

static REGION: LazyLock<Schema<RegionTable>> = LazyLock::new(|| {
    Schema::<RegionTable>::new("region")
        .column("id", |r| r.id.clone().into())
        .column("vendor", |r| r.vendor.clone().into())
        .column("account_id", |r| r.account_id.clone().into())
        .column("region_id", |r| r.region_id.clone().into())
        .column("region_name", |r| r.region_name.clone().into())
        .column("status", |r| r.status.clone().into())
        .column("endpoint", |r| r.endpoint.clone().into())
        .column("created_at", |r| r.created_at.clone().into())
        .column("updated_at", |r| r.updated_at.clone().into())
});

impl Table for RegionTable {
    fn schema() -> &'static Schema<Self> {
        &REGION
    }
}

pub struct AwsRegionSync;

impl SyncResource for AwsRegionSync {
    const NAME: &'static str = "region";
    const VENDOR: Vendor = Vendor::Aws;
    const PHASE_ORDER: PhaseOrder = PhaseOrder::DeleteCreateUpdate;
    const CLOUD_ID_FIELD: &'static str = "region_id";

    type Cloud = AwsRegion;
    type Row = RegionTable;

    fn cloud_id(cloud: &AwsRegion) -> &str {
        &cloud.region_id
    }

    fn row_id(row: &RegionTable) -> &str {
        &row.id
    }

    fn row_cloud_id(row: &RegionTable) -> &str {
        &row.region_id
    }

    fn is_changed(cloud: &AwsRegion, row: &RegionTable) -> bool {
        cloud.region_name != row.region_name
            || cloud.region_state != row.status
            || cloud.endpoint != row.endpoint
    }

    // Regions are account wide.
    fn scope_filter(scope: &SyncScope) -> Expression {
        super::scope_filter(scope, None)
    }

    fn update_fields() -> &'static [&'static str] {
        &["region_name", "status", "endpoint"]
    }

    fn to_create(scope: &SyncScope, cloud: &AwsRegion) -> Result<RegionTable> {
        Ok(RegionTable {
            id: String::new(),
            vendor: Vendor::Aws.as_str().to_string(),
            account_id: scope.account_id.clone(),
            region_id: cloud.region_id.clone(),
            region_name: cloud.region_name.clone(),
            status: cloud.region_state.clone(),
            endpoint: cloud.endpoint.clone(),
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    fn to_update(scope: &SyncScope, id: &str, cloud: &AwsRegion) -> Result<RegionTable> {
        let mut row = Self::to_create(scope, cloud)?;
        row.id = id.to_string();
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str) -> AwsRegion {
        AwsRegion {
            region_id: "r1".to_string(),
            region_name: name.to_string(),
            region_state: "available".to_string(),
            endpoint: "ec2.r1.amazonaws.com".to_string(),
        }
    }

    #[test]
    fn test_schema_accepts_declared_fields() {
        assert!(AwsRegionSync::table_manager().is_ok());
    }

    #[test]
    fn test_change_detection() {
        let scope = SyncScope::new(Vendor::Aws, "acc-1");
        let row = AwsRegionSync::to_create(&scope, &region("us-east-1")).unwrap();

        assert!(!AwsRegionSync::is_changed(&region("us-east-1"), &row));
        assert!(AwsRegionSync::is_changed(&region("us-east-2"), &row));

        let mut closed = region("us-east-1");
        closed.region_state = "not-opted-in".to_string();
        assert!(AwsRegionSync::is_changed(&closed, &row));
    }

    #[test]
    fn test_update_row_carries_surrogate_key() {
        let scope = SyncScope::new(Vendor::Aws, "acc-1");
        let row = AwsRegionSync::to_update(&scope, "k1", &region("us-east-1")).unwrap();
        assert_eq!(row.id, "k1");
        assert_eq!(row.vendor, "aws");
        assert_eq!(row.status, "available");
    }
}
