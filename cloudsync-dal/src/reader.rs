//! Paginated store reader.

use crate::dao::StoreWriter;
use crate::error::{DalError, Result};
use crate::filter::Expression;
use crate::page::{BasePage, MAX_PAGE_LIMIT};

/// Drain every row matching `filter`, `page_size` rows at a time.
///
/// Pages are requested from offset 0 upwards; the first page shorter than
/// `page_size` ends the walk. A final page of exactly `page_size` rows
/// therefore costs one more (empty) request.
pub async fn list_all<T, S>(store: &S, filter: &Expression, page_size: u32) -> Result<Vec<T>>
where
    T: Send + Sync,
    S: StoreWriter<T> + ?Sized,
{
    if page_size == 0 || page_size > MAX_PAGE_LIMIT {
        return Err(DalError::InvalidPage(format!(
            "page size must be in 1..={}, got {}",
            MAX_PAGE_LIMIT, page_size
        )));
    }

    let mut page = BasePage::new(0, page_size);
    let mut results = Vec::new();
    loop {
        let rows = store.list(filter, &page).await?;
        let count = rows.len();
        results.extend(rows);

        if count < page_size as usize {
            break;
        }
        page.start += page_size;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Serves pages out of a fixed vector and records every request.
    struct Backing {
        rows: Vec<u32>,
        requests: Mutex<Vec<(u32, u32)>>,
    }

    impl Backing {
        fn new(n: u32) -> Self {
            Self {
                rows: (0..n).collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(u32, u32)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreWriter<u32> for Backing {
        async fn batch_create(&self, _: &[u32]) -> Result<Vec<String>> {
            unreachable!()
        }

        async fn batch_update(&self, _: &[u32]) -> Result<()> {
            unreachable!()
        }

        async fn batch_delete(&self, _: &Expression) -> Result<u64> {
            unreachable!()
        }

        async fn list(&self, _: &Expression, page: &BasePage) -> Result<Vec<u32>> {
            self.requests.lock().unwrap().push((page.start, page.limit));
            Ok(self
                .rows
                .iter()
                .skip(page.start as usize)
                .take(page.limit as usize)
                .copied()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_short_page_ends_walk() {
        let store = Backing::new(5);
        let rows = list_all(&store, &Expression::all(), 2).await.unwrap();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
        assert_eq!(store.requests(), vec![(0, 2), (2, 2), (4, 2)]);
    }

    #[tokio::test]
    async fn test_full_last_page_costs_one_more_request() {
        let store = Backing::new(4);
        let rows = list_all(&store, &Expression::all(), 2).await.unwrap();
        assert_eq!(rows, vec![0, 1, 2, 3]);
        assert_eq!(store.requests(), vec![(0, 2), (2, 2), (4, 2)]);
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let store = Backing::new(0);
        let rows = list_all(&store, &Expression::all(), 500).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_page_size_bounds() {
        let store = Backing::new(3);
        assert!(list_all(&store, &Expression::all(), 0).await.is_err());
        assert!(
            list_all(&store, &Expression::all(), MAX_PAGE_LIMIT + 1)
                .await
                .is_err()
        );
        assert!(store.requests().is_empty());
    }
}
