//! Diff engine: split a cloud listing and a store listing into the rows to
//! create, update and delete.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Outcome of comparing one cloud view with one store view.
///
/// The three sets are disjoint by cloud identifier. Identifiers present on
/// both sides whose compared fields are equal appear in none of them.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult<C> {
    /// Cloud records with no stored counterpart, in cloud order.
    pub to_create: Vec<C>,
    /// Changed cloud records keyed by the stored row's surrogate key.
    pub to_update: BTreeMap<String, C>,
    /// Cloud identifiers only the store still knows, in store order.
    pub to_delete_cloud_ids: Vec<String>,
}

impl<C> Default for DiffResult<C> {
    fn default() -> Self {
        Self {
            to_create: Vec::new(),
            to_update: BTreeMap::new(),
            to_delete_cloud_ids: Vec::new(),
        }
    }
}

impl<C> DiffResult<C> {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_delete_cloud_ids.is_empty()
    }
}

/// Compare `cloud` against `store`.
///
/// `cloud_key` projects a cloud record onto its cloud identifier;
/// `store_key` projects a stored row onto `(surrogate key, cloud identifier)`.
/// `changed` decides whether a matched pair needs an update and must be pure.
///
/// A cloud identifier listed twice is taken from its first occurrence, and
/// so is a stored one.
pub fn diff<C, S, KC, KS, F>(
    cloud: Vec<C>,
    store: &[S],
    cloud_key: KC,
    store_key: KS,
    changed: F,
) -> DiffResult<C>
where
    KC: Fn(&C) -> &str,
    KS: Fn(&S) -> (&str, &str),
    F: Fn(&C, &S) -> bool,
{
    let mut result = DiffResult::default();
    if cloud.is_empty() && store.is_empty() {
        return result;
    }

    let mut stored: HashMap<&str, (&str, &S)> = HashMap::with_capacity(store.len());
    for row in store {
        let (id, cloud_id) = store_key(row);
        stored.entry(cloud_id).or_insert((id, row));
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(cloud.len());
    for one in cloud {
        let cloud_id = cloud_key(&one).to_string();
        if !seen.insert(cloud_id.clone()) {
            continue;
        }

        match stored.get(cloud_id.as_str()) {
            None => result.to_create.push(one),
            Some((id, row)) => {
                if changed(&one, *row) {
                    result.to_update.insert((*id).to_string(), one);
                }
            }
        }
    }

    for row in store {
        let (_, cloud_id) = store_key(row);
        if !seen.contains(cloud_id) && stored.remove(cloud_id).is_some() {
            result.to_delete_cloud_ids.push(cloud_id.to_string());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Cloud {
        id: &'static str,
        name: &'static str,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        key: &'static str,
        id: &'static str,
        name: &'static str,
    }

    fn cloud(id: &'static str, name: &'static str) -> Cloud {
        Cloud { id, name }
    }

    fn row(key: &'static str, id: &'static str, name: &'static str) -> Row {
        Row { key, id, name }
    }

    fn run(c: Vec<Cloud>, s: &[Row]) -> DiffResult<Cloud> {
        diff(
            c,
            s,
            |c: &Cloud| c.id,
            |r: &Row| (r.key, r.id),
            |c: &Cloud, r: &Row| c.name != r.name,
        )
    }

    #[test]
    fn test_both_empty() {
        let result = run(vec![], &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_cloud_only_is_created() {
        let result = run(vec![cloud("r1", "us-east-1")], &[]);
        assert_eq!(result.to_create, vec![cloud("r1", "us-east-1")]);
        assert!(result.to_update.is_empty());
        assert!(result.to_delete_cloud_ids.is_empty());
    }

    #[test]
    fn test_changed_pair_is_updated_by_surrogate_key() {
        let result = run(
            vec![cloud("r1", "us-east-2")],
            &[row("k1", "r1", "us-east-1")],
        );
        assert!(result.to_create.is_empty());
        assert_eq!(result.to_update.len(), 1);
        assert_eq!(result.to_update["k1"], cloud("r1", "us-east-2"));
        assert!(result.to_delete_cloud_ids.is_empty());
    }

    #[test]
    fn test_identical_views_produce_nothing() {
        let result = run(
            vec![cloud("r1", "a"), cloud("r2", "b")],
            &[row("k2", "r2", "b"), row("k1", "r1", "a")],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_store_only_is_deleted() {
        let result = run(vec![], &[row("k1", "r1", "a"), row("k2", "r2", "b")]);
        assert_eq!(result.to_delete_cloud_ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let c = vec![
            cloud("new", "n"),
            cloud("same", "s"),
            cloud("moved", "m2"),
        ];
        let s = [
            row("k1", "same", "s"),
            row("k2", "moved", "m1"),
            row("k3", "gone", "g"),
        ];
        let result = run(c, &s);

        let created: HashSet<&str> = result.to_create.iter().map(|c| c.id).collect();
        let updated: HashSet<&str> = result.to_update.values().map(|c| c.id).collect();
        let deleted: HashSet<&str> = result
            .to_delete_cloud_ids
            .iter()
            .map(String::as_str)
            .collect();

        assert_eq!(created, HashSet::from(["new"]));
        assert_eq!(updated, HashSet::from(["moved"]));
        assert_eq!(deleted, HashSet::from(["gone"]));
        assert!(created.is_disjoint(&updated));
        assert!(created.is_disjoint(&deleted));
        assert!(updated.is_disjoint(&deleted));
    }

    #[test]
    fn test_duplicates_take_first_occurrence() {
        let result = run(
            vec![cloud("r1", "first"), cloud("r1", "second")],
            &[row("k1", "r9", "x"), row("k2", "r9", "y")],
        );
        assert_eq!(result.to_create, vec![cloud("r1", "first")]);
        assert_eq!(result.to_delete_cloud_ids, vec!["r9"]);
    }
}
