//! Pagination options for list statements.

use serde::{Deserialize, Serialize};

use crate::error::{DalError, Result};
use crate::filter::is_identifier;

/// Largest page a single list statement may request.
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// One page of a list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePage {
    pub start: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Order,
}

impl BasePage {
    pub fn new(start: u32, limit: u32) -> Self {
        Self {
            start,
            limit,
            sort: None,
            order: Order::Asc,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(DalError::InvalidPage(format!(
                "limit must be in 1..={}, got {}",
                MAX_PAGE_LIMIT, self.limit
            )));
        }
        if let Some(sort) = &self.sort {
            if !is_identifier(sort) {
                return Err(DalError::InvalidPage(format!(
                    "sort field {:?} is not a valid column name",
                    sort
                )));
            }
        }
        Ok(())
    }

    /// Render `ORDER BY ... LIMIT ... OFFSET ...`.
    ///
    /// Without an explicit sort the page orders by `default_sort`, so that
    /// repeated reads walk the rows in the same order.
    pub fn sql_expr(&self, default_sort: &str) -> Result<String> {
        self.validate()?;
        let sort = self.sort.as_deref().unwrap_or(default_sort);
        if !is_identifier(sort) {
            return Err(DalError::InvalidPage(format!(
                "sort field {:?} is not a valid column name",
                sort
            )));
        }

        // Break ties on the default key so pages never overlap.
        let order_by = if sort == default_sort {
            format!("{} {}", sort, self.order.sql())
        } else {
            format!("{} {}, {} ASC", sort, self.order.sql(), default_sort)
        };

        Ok(format!(
            "ORDER BY {} LIMIT {} OFFSET {}",
            order_by, self.limit, self.start
        ))
    }
}

impl Default for BasePage {
    fn default() -> Self {
        Self::new(0, MAX_PAGE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sort() {
        let page = BasePage::new(10, 5);
        assert_eq!(
            page.sql_expr("id").unwrap(),
            "ORDER BY id ASC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_explicit_sort_keeps_tie_break() {
        let page = BasePage {
            sort: Some("name".to_string()),
            order: Order::Desc,
            ..BasePage::new(0, 20)
        };
        assert_eq!(
            page.sql_expr("id").unwrap(),
            "ORDER BY name DESC, id ASC LIMIT 20 OFFSET 0"
        );
    }

    #[test]
    fn test_limit_bounds() {
        assert!(BasePage::new(0, 0).validate().is_err());
        assert!(BasePage::new(0, MAX_PAGE_LIMIT + 1).validate().is_err());
        assert!(BasePage::new(0, MAX_PAGE_LIMIT).validate().is_ok());
    }

    #[test]
    fn test_sort_must_be_identifier() {
        let page = BasePage {
            sort: Some("id; DROP".to_string()),
            ..BasePage::default()
        };
        assert!(matches!(page.validate(), Err(DalError::InvalidPage(_))));
    }
}
