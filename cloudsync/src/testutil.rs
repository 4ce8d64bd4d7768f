//! In-process doubles for the cloud adaptor and the store.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cloudsync_dal::{
    BasePage, DalError, Expression, ID_FIELD, Operator, Rule, StoreWriter, Table, Value,
};

use crate::adaptor::CloudAdaptor;
use crate::error::StoreOp;
use crate::resources::region::RegionTable;
use crate::scope::SyncScope;

/// Returns the scripted listings in turn, then keeps repeating the last.
pub struct ScriptedAdaptor<C> {
    listings: Vec<Vec<C>>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl<C> ScriptedAdaptor<C> {
    pub fn new(listings: Vec<Vec<C>>) -> Self {
        Self {
            listings,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            listings: Vec::new(),
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Clone + Send + Sync> CloudAdaptor<C> for ScriptedAdaptor<C> {
    async fn list_resources(&self, _scope: &SyncScope) -> anyhow::Result<Vec<C>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }
        let idx = n.min(self.listings.len().saturating_sub(1));
        Ok(self.listings.get(idx).cloned().unwrap_or_default())
    }
}

/// A store call, as seen by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { start: u32, limit: u32 },
    /// Number of records in the batch.
    Create(usize),
    Update(usize),
    /// Number of rows removed.
    Delete(usize),
}

/// Vector-backed [`StoreWriter`] that evaluates filters against the row
/// schema and records every call.
pub struct MemoryStore<T> {
    rows: Mutex<Vec<T>>,
    calls: Mutex<Vec<Call>>,
    fail_on: Mutex<Option<StoreOp>>,
    next_id: AtomicUsize,
    set_id: fn(&mut T, String),
}

impl MemoryStore<RegionTable> {
    pub fn regions() -> Self {
        Self::new(|row, id| row.id = id)
    }
}

impl<T: Table + Clone> MemoryStore<T> {
    pub fn new(set_id: fn(&mut T, String)) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            next_id: AtomicUsize::new(1),
            set_id,
        }
    }

    /// Insert rows as-is, bypassing the call log.
    pub fn seed(&self, rows: Vec<T>) {
        self.rows.lock().unwrap().extend(rows);
    }

    pub fn rows(&self) -> Vec<T> {
        self.rows.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than lists.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::List { .. }))
            .collect()
    }

    /// Row counts of every `op` write, in call order.
    pub fn batch_sizes(&self, op: StoreOp) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match (op, c) {
                (StoreOp::Create, Call::Create(n))
                | (StoreOp::Update, Call::Update(n))
                | (StoreOp::Delete, Call::Delete(n)) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Make every later call of `op` fail.
    pub fn fail_on(&self, op: StoreOp) {
        *self.fail_on.lock().unwrap() = Some(op);
    }

    fn check(&self, op: StoreOp) -> cloudsync_dal::Result<()> {
        if *self.fail_on.lock().unwrap() == Some(op) {
            return Err(DalError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn id_of(row: &T) -> Value {
        T::schema().value(row, ID_FIELD).unwrap_or(Value::Null)
    }
}

fn matches_expr<T: Table>(row: &T, expr: &Expression) -> bool {
    let mut results = expr.rules.iter().map(|rule| match rule {
        Rule::Atom(atom) => {
            let actual = T::schema()
                .value(row, &atom.field)
                .unwrap_or(Value::Null);
            match (atom.op, &atom.value) {
                (Operator::Equal, v) => actual == *v,
                (Operator::NotEqual, v) => actual != *v,
                (Operator::In, Value::List(items)) => items.contains(&actual),
                (Operator::NotIn, Value::List(items)) => !items.contains(&actual),
                (op, _) => unimplemented!("operator {} in memory store", op),
            }
        }
        Rule::Expr(nested) => matches_expr(row, nested),
    });
    match expr.op {
        cloudsync_dal::LogicOp::And => results.all(|ok| ok),
        cloudsync_dal::LogicOp::Or => results.any(|ok| ok),
    }
}

#[async_trait]
impl<T: Table + Clone> StoreWriter<T> for MemoryStore<T> {
    async fn batch_create(&self, records: &[T]) -> cloudsync_dal::Result<Vec<String>> {
        self.record(Call::Create(records.len()));
        self.check(StoreOp::Create)?;

        let mut rows = self.rows.lock().unwrap();
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = format!("m{:08}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let mut row = record.clone();
            (self.set_id)(&mut row, id.clone());
            rows.push(row);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn batch_update(&self, records: &[T]) -> cloudsync_dal::Result<()> {
        self.record(Call::Update(records.len()));
        self.check(StoreOp::Update)?;

        let mut rows = self.rows.lock().unwrap();
        for record in records {
            let id = Self::id_of(record);
            if let Some(row) = rows.iter_mut().find(|r| Self::id_of(r) == id) {
                *row = record.clone();
            }
        }
        Ok(())
    }

    async fn batch_delete(&self, filter: &Expression) -> cloudsync_dal::Result<u64> {
        if filter.is_empty() {
            return Err(DalError::InvalidFilter(
                "delete requires a non-empty filter".to_string(),
            ));
        }
        self.check(StoreOp::Delete)?;

        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !matches_expr(r, filter));
        let removed = before - rows.len();
        drop(rows);

        self.record(Call::Delete(removed));
        Ok(removed as u64)
    }

    async fn list(&self, filter: &Expression, page: &BasePage) -> cloudsync_dal::Result<Vec<T>> {
        self.record(Call::List {
            start: page.start,
            limit: page.limit,
        });
        self.check(StoreOp::List)?;

        let mut matched: Vec<T> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches_expr(*r, filter))
            .cloned()
            .collect();
        matched.sort_by_key(|r| match Self::id_of(r) {
            Value::Text(s) => s,
            other => format!("{:?}", other),
        });
        Ok(matched
            .into_iter()
            .skip(page.start as usize)
            .take(page.limit as usize)
            .collect())
    }
}
