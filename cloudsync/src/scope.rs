//! Vendors and reconciliation scopes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Cloud vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Aws,
    Azure,
    Gcp,
    #[value(name = "tcloud")]
    TCloud,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Aws => "aws",
            Vendor::Azure => "azure",
            Vendor::Gcp => "gcp",
            Vendor::TCloud => "tcloud",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one reconciliation pass covers: a vendor account, optionally
/// narrowed to one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncScope {
    pub vendor: Vendor,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl SyncScope {
    pub fn new(vendor: Vendor, account_id: impl Into<String>) -> Self {
        Self {
            vendor,
            account_id: account_id.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(SyncError::InvalidParameter(
                "account_id is required".to_string(),
            ));
        }
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(SyncError::InvalidParameter(
                    "region must not be empty when given".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}/{}/{}", self.vendor, self.account_id, region),
            None => write!(f, "{}/{}", self.vendor, self.account_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(SyncScope::new(Vendor::Aws, "acc-1").validate().is_ok());
        assert!(SyncScope::new(Vendor::Aws, " ").validate().is_err());
        assert!(
            SyncScope::new(Vendor::Azure, "acc-1")
                .with_region("")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_display() {
        let scope = SyncScope::new(Vendor::Azure, "acc-1").with_region("westeurope");
        assert_eq!(scope.to_string(), "azure/acc-1/westeurope");
        assert_eq!(SyncScope::new(Vendor::TCloud, "a").to_string(), "tcloud/a");
    }

    #[test]
    fn test_vendor_serde() {
        let v: Vendor = serde_json::from_str("\"tcloud\"").unwrap();
        assert_eq!(v, Vendor::TCloud);
        assert_eq!(serde_json::to_string(&Vendor::Gcp).unwrap(), "\"gcp\"");
    }
}
