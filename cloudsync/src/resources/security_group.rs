//! Azure network security groups.
//!
//! Provider-only attributes are kept in the row's JSON `extension` column.

use std::sync::LazyLock;

use cloudsync_dal::{Expression, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::scope::{SyncScope, Vendor};
use crate::sync::{PhaseOrder, SyncResource};

/// Business id of rows not yet assigned to a business.
pub const UNASSIGNED_BIZ_ID: i64 = -1;

/// A network security group as listed by the Azure network API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSecurityGroup {
    /// Full ARM resource id.
    pub id: String,
    pub name: String,
    pub location: String,
    pub resource_group_name: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub resource_guid: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSecurityGroupExtension {
    pub resource_group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl From<&AzureSecurityGroup> for AzureSecurityGroupExtension {
    fn from(sg: &AzureSecurityGroup) -> Self {
        Self {
            resource_group_name: sg.resource_group_name.clone(),
            etag: sg.etag.clone(),
            resource_guid: sg.resource_guid.clone(),
            provisioning_state: sg.provisioning_state.clone(),
        }
    }
}

/// Row of the `security_group` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SecurityGroupTable {
    pub id: String,
    pub vendor: String,
    pub account_id: String,
    pub cloud_id: String,
    pub bk_biz_id: i64,
    pub region: String,
    pub name: String,
    pub memo: Option<String>,
    /// JSON-encoded [`AzureSecurityGroupExtension`].
    pub extension: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SecurityGroupTable {
    pub fn extension(&self) -> Option<AzureSecurityGroupExtension> {
        serde_json::from_str(&self.extension).ok()
    }
}

static SECURITY_GROUP: LazyLock<Schema<SecurityGroupTable>> = LazyLock::new(|| {
    Schema::<SecurityGroupTable>::new("security_group")
        .column("id", |r| r.id.clone().into())
        .column("vendor", |r| r.vendor.clone().into())
        .column("account_id", |r| r.account_id.clone().into())
        .column("cloud_id", |r| r.cloud_id.clone().into())
        .column("bk_biz_id", |r| r.bk_biz_id.into())
        .column("region", |r| r.region.clone().into())
        .column("name", |r| r.name.clone().into())
        .column("memo", |r| r.memo.clone().into())
        .column("extension", |r| r.extension.clone().into())
        .column("created_at", |r| r.created_at.clone().into())
        .column("updated_at", |r| r.updated_at.clone().into())
});

impl Table for SecurityGroupTable {
    fn schema() -> &'static Schema<Self> {
        &SECURITY_GROUP
    }
}

fn encode_extension(sg: &AzureSecurityGroup) -> Result<String> {
    serde_json::to_string(&AzureSecurityGroupExtension::from(sg)).map_err(|source| {
        SyncError::Encode {
            resource: AzureSecurityGroupSync::NAME,
            source,
        }
    })
}

pub struct AzureSecurityGroupSync;

impl SyncResource for AzureSecurityGroupSync {
    const NAME: &'static str = "security_group";
    const VENDOR: Vendor = Vendor::Azure;
    const PHASE_ORDER: PhaseOrder = PhaseOrder::DeleteUpdateCreate;
    const CLOUD_ID_FIELD: &'static str = "cloud_id";
    const REGIONAL: bool = true;

    type Cloud = AzureSecurityGroup;
    type Row = SecurityGroupTable;

    fn cloud_id(cloud: &AzureSecurityGroup) -> &str {
        &cloud.id
    }

    fn row_id(row: &SecurityGroupTable) -> &str {
        &row.id
    }

    fn row_cloud_id(row: &SecurityGroupTable) -> &str {
        &row.cloud_id
    }

    fn is_changed(cloud: &AzureSecurityGroup, row: &SecurityGroupTable) -> bool {
        if cloud.name != row.name || cloud.location != row.region {
            return true;
        }
        // An unreadable stored extension is rewritten.
        row.extension() != Some(AzureSecurityGroupExtension::from(cloud))
    }

    fn scope_filter(scope: &SyncScope) -> Expression {
        super::scope_filter(scope, Some("region"))
    }

    fn update_fields() -> &'static [&'static str] {
        &["name", "region", "extension"]
    }

    fn to_create(scope: &SyncScope, cloud: &AzureSecurityGroup) -> Result<SecurityGroupTable> {
        Ok(SecurityGroupTable {
            id: String::new(),
            vendor: Vendor::Azure.as_str().to_string(),
            account_id: scope.account_id.clone(),
            cloud_id: cloud.id.clone(),
            bk_biz_id: UNASSIGNED_BIZ_ID,
            region: cloud.location.clone(),
            name: cloud.name.clone(),
            memo: None,
            extension: encode_extension(cloud)?,
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    fn to_update(
        scope: &SyncScope,
        id: &str,
        cloud: &AzureSecurityGroup,
    ) -> Result<SecurityGroupTable> {
        let mut row = Self::to_create(scope, cloud)?;
        row.id = id.to_string();
        Ok(row)
    }
}
