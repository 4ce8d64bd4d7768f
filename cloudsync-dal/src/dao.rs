//! Store Writer boundary and its SQLite implementation.

use async_trait::async_trait;
use sqlx::Arguments;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use tracing::debug;

use crate::error::{DalError, Result};
use crate::filter::{Expression, Value};
use crate::page::BasePage;
use crate::table::{ID_FIELD, ListOption, Table, TableManager};

/// Batched writes and paged reads of one record type.
///
/// Errors from the underlying store are passed through unmodified.
#[async_trait]
pub trait StoreWriter<T: Send + Sync>: Send + Sync {
    /// Insert `records`; returns their surrogate keys in input order.
    async fn batch_create(&self, records: &[T]) -> Result<Vec<String>>;

    /// Update each record, matched by its surrogate key.
    async fn batch_update(&self, records: &[T]) -> Result<()>;

    /// Delete every row matching `filter`; returns the number removed.
    async fn batch_delete(&self, filter: &Expression) -> Result<u64>;

    /// One page of rows matching `filter`.
    async fn list(&self, filter: &Expression, page: &BasePage) -> Result<Vec<T>>;
}

/// Turn bound values into SQLite arguments, in placeholder order.
fn arguments<'q>(values: Vec<Value>) -> Result<SqliteArguments<'q>> {
    let mut args = SqliteArguments::default();
    for value in values {
        let added = match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(b) => args.add(b),
            Value::Int(i) => args.add(i),
            Value::Float(f) => args.add(f),
            Value::Text(s) => args.add(s),
            Value::List(items) => {
                let json = serde_json::to_string(&items)
                    .map_err(|e| DalError::Database(sqlx::Error::Encode(Box::new(e))))?;
                args.add(json)
            }
        };
        added.map_err(|e| DalError::Database(sqlx::Error::Encode(e)))?;
    }
    Ok(args)
}

/// SQLite-backed [`StoreWriter`] for table `T`.
pub struct Dao<T: Table> {
    pool: SqlitePool,
    manager: TableManager<T>,
}

impl<T: Table> Dao<T> {
    pub fn new(pool: SqlitePool, manager: TableManager<T>) -> Self {
        Self { pool, manager }
    }
}

#[async_trait]
impl<T: Table> StoreWriter<T> for Dao<T> {
    async fn batch_create(&self, records: &[T]) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} RETURNING {}", self.manager.sql_for_insert(), ID_FIELD);
        debug!(table = self.manager.table_name(), count = records.len(), %sql, "batch insert");

        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let args = arguments(self.manager.field_values_for_insert(record))?;
            let id: String = sqlx::query_scalar_with(&sql, args)
                .fetch_one(&mut *tx)
                .await?;
            ids.push(id);
        }
        tx.commit().await?;

        Ok(ids)
    }

    async fn batch_update(&self, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        debug!(table = self.manager.table_name(), count = records.len(), "batch update");

        let mut tx = self.pool.begin().await?;
        for record in records {
            let id = self.manager.id_of(record).ok_or_else(|| {
                DalError::InvalidFilter(format!(
                    "{} record without id cannot be updated",
                    self.manager.table_name()
                ))
            })?;
            let stmt = self
                .manager
                .sql_for_update(record, &Expression::equal(ID_FIELD, id))?;
            sqlx::query_with(&stmt.sql, arguments(stmt.args)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn batch_delete(&self, filter: &Expression) -> Result<u64> {
        let stmt = self.manager.sql_for_delete(filter)?;
        debug!(table = self.manager.table_name(), sql = %stmt.sql, "batch delete");

        let result = sqlx::query_with(&stmt.sql, arguments(stmt.args)?)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list(&self, filter: &Expression, page: &BasePage) -> Result<Vec<T>> {
        let opt = ListOption::new(filter.clone(), page.clone());
        let stmt = self.manager.sql_for_list(&opt, None)?;

        let rows = sqlx::query_as_with::<_, T, _>(&stmt.sql, arguments(stmt.args)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
