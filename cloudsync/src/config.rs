//! Reconciliation settings.

use cloudsync_dal::{MAX_IN_LIMIT, MAX_PAGE_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Most rows written by one store call.
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Rows requested per page when reading the store view.
pub const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        // A delete batch becomes one IN list.
        if self.max_batch == 0 || self.max_batch > MAX_IN_LIMIT {
            return Err(SyncError::InvalidParameter(format!(
                "max_batch must be in 1..={}, got {}",
                MAX_IN_LIMIT, self.max_batch
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_LIMIT {
            return Err(SyncError::InvalidParameter(format!(
                "page_size must be in 1..={}, got {}",
                MAX_PAGE_LIMIT, self.page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert_eq!(config.max_batch, 100);
        assert_eq!(config.page_size, 500);
        assert!(config.validate().is_ok());

        let parsed: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_bounds() {
        let zero_batch = SyncConfig {
            max_batch: 0,
            ..SyncConfig::default()
        };
        assert!(zero_batch.validate().is_err());

        let big_batch = SyncConfig {
            max_batch: 501,
            ..SyncConfig::default()
        };
        assert!(big_batch.validate().is_err());

        let widest = SyncConfig {
            max_batch: 500,
            ..SyncConfig::default()
        };
        assert!(widest.validate().is_ok());

        let big_page = SyncConfig {
            page_size: 501,
            ..SyncConfig::default()
        };
        assert!(big_page.validate().is_err());
    }
}
