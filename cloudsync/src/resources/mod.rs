//! Per-vendor resource types.

pub mod firewall_rule;
pub mod region;
pub mod security_group;

use cloudsync_dal::{AtomRule, Expression, Operator};

use crate::scope::SyncScope;

/// Rows of `scope`'s vendor and account, narrowed to `region_field` when
/// the scope names a region.
pub(crate) fn scope_filter(scope: &SyncScope, region_field: Option<&str>) -> Expression {
    let mut filter = Expression::and(vec![
        AtomRule::new("vendor", Operator::Equal, scope.vendor.as_str()).into(),
        AtomRule::new("account_id", Operator::Equal, &scope.account_id).into(),
    ]);
    if let (Some(field), Some(region)) = (region_field, &scope.region) {
        filter = filter.push(AtomRule::new(field, Operator::Equal, region));
    }
    filter
}
