//! GCP VPC firewall rules.

use std::sync::LazyLock;

use cloudsync_dal::{Expression, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::scope::{SyncScope, Vendor};
use crate::sync::{PhaseOrder, SyncResource};

/// One `allowed`/`denied` entry of a firewall rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSet {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

/// A firewall rule as returned by the Compute Engine API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpFirewallRule {
    /// Numeric id, as a decimal string.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub network: String,
    pub priority: i64,
    pub direction: String,
    #[serde(default)]
    pub source_ranges: Vec<String>,
    #[serde(default)]
    pub destination_ranges: Vec<String>,
    #[serde(default)]
    pub target_tags: Vec<String>,
    #[serde(default)]
    pub allowed: Vec<ProtocolSet>,
    #[serde(default)]
    pub denied: Vec<ProtocolSet>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub self_link: String,
}

/// Row of the `gcp_firewall_rule` table. List columns hold JSON arrays.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FirewallRuleTable {
    pub id: String,
    pub vendor: String,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub memo: String,
    pub network: String,
    pub priority: i64,
    pub direction: String,
    pub source_ranges: String,
    pub destination_ranges: String,
    pub target_tags: String,
    pub allowed: String,
    pub denied: String,
    pub disabled: bool,
    pub self_link: String,
    pub created_at: String,
    pub updated_at: String,
}

static GCP_FIREWALL_RULE: LazyLock<Schema<FirewallRuleTable>> = LazyLock::new(|| {
    Schema::<FirewallRuleTable>::new("gcp_firewall_rule")
        .column("id", |r| r.id.clone().into())
        .column("vendor", |r| r.vendor.clone().into())
        .column("account_id", |r| r.account_id.clone().into())
        .column("cloud_id", |r| r.cloud_id.clone().into())
        .column("name", |r| r.name.clone().into())
        .column("memo", |r| r.memo.clone().into())
        .column("network", |r| r.network.clone().into())
        .column("priority", |r| r.priority.into())
        .column("direction", |r| r.direction.clone().into())
        .column("source_ranges", |r| r.source_ranges.clone().into())
        .column("destination_ranges", |r| r.destination_ranges.clone().into())
        .column("target_tags", |r| r.target_tags.clone().into())
        .column("allowed", |r| r.allowed.clone().into())
        .column("denied", |r| r.denied.clone().into())
        .column("disabled", |r| r.disabled.into())
        .column("self_link", |r| r.self_link.clone().into())
        .column("created_at", |r| r.created_at.clone().into())
        .column("updated_at", |r| r.updated_at.clone().into())
});

impl Table for FirewallRuleTable {
    fn schema() -> &'static Schema<Self> {
        &GCP_FIREWALL_RULE
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| SyncError::Encode {
        resource: GcpFirewallRuleSync::NAME,
        source,
    })
}

fn same_json<T: Serialize>(value: &T, stored: &str) -> bool {
    serde_json::to_string(value).is_ok_and(|s| s == stored)
}

pub struct GcpFirewallRuleSync;

impl SyncResource for GcpFirewallRuleSync {
    const NAME: &'static str = "gcp_firewall_rule";
    const VENDOR: Vendor = Vendor::Gcp;
    const PHASE_ORDER: PhaseOrder = PhaseOrder::DeleteCreateUpdate;
    const CLOUD_ID_FIELD: &'static str = "cloud_id";

    type Cloud = GcpFirewallRule;
    type Row = FirewallRuleTable;

    fn cloud_id(cloud: &GcpFirewallRule) -> &str {
        &cloud.id
    }

    fn row_id(row: &FirewallRuleTable) -> &str {
        &row.id
    }

    fn row_cloud_id(row: &FirewallRuleTable) -> &str {
        &row.cloud_id
    }

    fn is_changed(cloud: &GcpFirewallRule, row: &FirewallRuleTable) -> bool {
        cloud.name != row.name
            || cloud.description != row.memo
            || cloud.network != row.network
            || cloud.priority != row.priority
            || cloud.direction != row.direction
            || cloud.disabled != row.disabled
            || cloud.self_link != row.self_link
            || !same_json(&cloud.source_ranges, &row.source_ranges)
            || !same_json(&cloud.destination_ranges, &row.destination_ranges)
            || !same_json(&cloud.target_tags, &row.target_tags)
            || !same_json(&cloud.allowed, &row.allowed)
            || !same_json(&cloud.denied, &row.denied)
    }

    // Firewall rules are global to a project.
    fn scope_filter(scope: &SyncScope) -> Expression {
        super::scope_filter(scope, None)
    }

    fn update_fields() -> &'static [&'static str] {
        &[
            "name",
            "memo",
            "network",
            "priority",
            "direction",
            "source_ranges",
            "destination_ranges",
            "target_tags",
            "allowed",
            "denied",
            "disabled",
            "self_link",
        ]
    }

    fn to_create(scope: &SyncScope, cloud: &GcpFirewallRule) -> Result<FirewallRuleTable> {
        Ok(FirewallRuleTable {
            id: String::new(),
            vendor: Vendor::Gcp.as_str().to_string(),
            account_id: scope.account_id.clone(),
            cloud_id: cloud.id.clone(),
            name: cloud.name.clone(),
            memo: cloud.description.clone(),
            network: cloud.network.clone(),
            priority: cloud.priority,
            direction: cloud.direction.clone(),
            source_ranges: encode(&cloud.source_ranges)?,
            destination_ranges: encode(&cloud.destination_ranges)?,
            target_tags: encode(&cloud.target_tags)?,
            allowed: encode(&cloud.allowed)?,
            denied: encode(&cloud.denied)?,
            disabled: cloud.disabled,
            self_link: cloud.self_link.clone(),
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    fn to_update(
        scope: &SyncScope,
        id: &str,
        cloud: &GcpFirewallRule,
    ) -> Result<FirewallRuleTable> {
        let mut row = Self::to_create(scope, cloud)?;
        row.id = id.to_string();
        Ok(row)
    }
}
