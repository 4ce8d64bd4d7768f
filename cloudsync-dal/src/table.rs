//! Table schemas and SQL statement builders.
//!
//! Each record type registers a [`Schema`] once: the table name plus an
//! ordered list of columns, each with an accessor that reads the column's
//! value out of a record. A [`TableManager`] layered on top declares which
//! columns inserts and updates touch and renders the statements. Builders
//! never touch the database; [`crate::dao::Dao`] executes what they build.

use std::collections::HashSet;
use std::marker::PhantomData;

use chrono::Utc;
use sqlx::FromRow;
use sqlx::sqlite::SqliteRow;

use crate::error::{DalError, Result};
use crate::filter::{Bindings, Expression, SqlWhereOption, Value, is_identifier};
use crate::page::BasePage;

/// Surrogate primary key column, assigned by the store.
pub const ID_FIELD: &str = "id";
/// Set once when the row is inserted.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Refreshed on every update.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Reads one column value out of a record.
pub type Accessor<T> = fn(&T) -> Value;

/// A persisted column of record type `T`.
pub struct Column<T> {
    pub name: &'static str,
    get: Accessor<T>,
}

/// Ordered column layout of a record type.
pub struct Schema<T> {
    table: &'static str,
    columns: Vec<Column<T>>,
}

impl<T> Schema<T> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
        }
    }

    /// Register the next column.
    pub fn column(mut self, name: &'static str, get: Accessor<T>) -> Self {
        self.columns.push(Column { name, get });
        self
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Whether updates refresh `updated_at` automatically.
    pub fn has_timestamp(&self) -> bool {
        self.contains(UPDATED_AT_FIELD)
    }

    fn lookup(&self, name: &str) -> Option<&Column<T>> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Value of column `name` in `record`.
    pub fn value(&self, record: &T, name: &str) -> Option<Value> {
        self.lookup(name).map(|c| (c.get)(record))
    }

    /// Check the layout itself: valid identifiers, no duplicates, and a
    /// surrogate key column.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(self.table) {
            return Err(DalError::config(self.table, "table name is not an identifier"));
        }
        let mut seen = HashSet::new();
        for c in &self.columns {
            if !is_identifier(c.name) {
                return Err(DalError::config(
                    self.table,
                    format!("column {:?} is not an identifier", c.name),
                ));
            }
            if !seen.insert(c.name) {
                return Err(DalError::config(
                    self.table,
                    format!("column {} registered twice", c.name),
                ));
            }
        }
        if !seen.contains(ID_FIELD) {
            return Err(DalError::config(self.table, "missing id column"));
        }
        Ok(())
    }
}

/// A record type persisted in one table.
pub trait Table: Sized + for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    /// The type's column layout, built once for the life of the process.
    fn schema() -> &'static Schema<Self>;
}

/// A rendered statement and the values for its numbered placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Options of a list statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOption {
    /// Columns to select; empty selects every schema column.
    pub fields: Vec<String>,
    pub filter: Expression,
    pub page: Option<BasePage>,
}

impl ListOption {
    pub fn new(filter: Expression, page: BasePage) -> Self {
        Self {
            fields: Vec::new(),
            filter,
            page: Some(page),
        }
    }
}

/// Insert/update column configuration of a table.
///
/// Both field lists are checked against the schema by [`TableManager::new`];
/// an unknown name is a configuration error reported before any statement
/// is built.
pub struct TableManager<T: Table> {
    insert_fields: Vec<&'static str>,
    update_fields: Vec<&'static str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Table> Clone for TableManager<T> {
    fn clone(&self) -> Self {
        Self {
            insert_fields: self.insert_fields.clone(),
            update_fields: self.update_fields.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Table> TableManager<T> {
    /// `insert_fields` empty means every column. `update_fields` empty means
    /// only the managed timestamp is touched.
    pub fn new(insert_fields: &[&str], update_fields: &[&str]) -> Result<Self> {
        let schema = T::schema();
        schema.validate()?;

        let resolve = |name: &str| -> Result<&'static str> {
            schema.lookup(name).map(|c| c.name).ok_or_else(|| {
                DalError::config(schema.table(), format!("field {} not in schema", name))
            })
        };

        let insert_fields = if insert_fields.is_empty() {
            schema.field_names()
        } else {
            insert_fields
                .iter()
                .map(|f| resolve(f))
                .collect::<Result<Vec<_>>>()?
        };
        // The store assigns the surrogate key.
        let insert_fields = insert_fields
            .into_iter()
            .filter(|f| *f != ID_FIELD)
            .collect();

        let mut resolved = Vec::with_capacity(update_fields.len());
        for f in update_fields {
            let name = resolve(f)?;
            if name == ID_FIELD {
                return Err(DalError::config(
                    schema.table(),
                    "the id column cannot be updated",
                ));
            }
            if name != UPDATED_AT_FIELD && !resolved.contains(&name) {
                resolved.push(name);
            }
        }

        Ok(Self {
            insert_fields,
            update_fields: resolved,
            _marker: PhantomData,
        })
    }

    pub fn table_name(&self) -> &'static str {
        T::schema().table()
    }

    pub fn insert_fields(&self) -> &[&'static str] {
        &self.insert_fields
    }

    pub fn update_fields(&self) -> &[&'static str] {
        &self.update_fields
    }

    /// Surrogate key of a record, as text.
    pub fn id_of(&self, record: &T) -> Option<String> {
        match T::schema().value(record, ID_FIELD)? {
            Value::Text(s) => Some(s),
            Value::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// `INSERT INTO t (a, b) VALUES (?1, ?2)`
    pub fn sql_for_insert(&self) -> String {
        let placeholders: Vec<String> = (1..=self.insert_fields.len())
            .map(|i| format!("?{}", i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name(),
            self.insert_fields.join(", "),
            placeholders.join(", ")
        )
    }

    /// Values for [`Self::sql_for_insert`], in column order. Managed
    /// timestamp columns get the current time.
    pub fn field_values_for_insert(&self, record: &T) -> Vec<Value> {
        let schema = T::schema();
        let now = Utc::now().to_rfc3339();
        self.insert_fields
            .iter()
            .map(|f| match *f {
                CREATED_AT_FIELD | UPDATED_AT_FIELD => Value::Text(now.clone()),
                _ => schema.value(record, f).unwrap_or(Value::Null),
            })
            .collect()
    }

    /// The `(column, value)` pairs an update writes, read from `record`.
    pub fn field_kv_for_update(&self, record: &T) -> Vec<(&'static str, Value)> {
        let schema = T::schema();
        self.update_fields
            .iter()
            .map(|f| (*f, schema.value(record, f).unwrap_or(Value::Null)))
            .collect()
    }

    /// `UPDATE t SET a = ?1, updated_at = ?2 WHERE ...`
    pub fn sql_for_update(&self, record: &T, expr: &Expression) -> Result<Statement> {
        if expr.is_empty() {
            return Err(DalError::InvalidFilter(
                "update requires a non-empty filter".to_string(),
            ));
        }
        self.validate_filter(expr)?;

        let mut bindings = Bindings::new();
        let mut set = Vec::new();
        for (field, value) in self.field_kv_for_update(record) {
            set.push(format!("{} = {}", field, bindings.push(value)));
        }
        if T::schema().has_timestamp() {
            let now = Value::Text(Utc::now().to_rfc3339());
            set.push(format!("{} = {}", UPDATED_AT_FIELD, bindings.push(now)));
        }
        if set.is_empty() {
            return Err(DalError::config(
                self.table_name(),
                "update has no fields and no timestamp column",
            ));
        }

        let where_expr = expr.sql_where(&SqlWhereOption::default(), &mut bindings)?;
        Ok(Statement {
            sql: format!(
                "UPDATE {} SET {} {}",
                self.table_name(),
                set.join(", "),
                where_expr
            ),
            args: bindings.into_values(),
        })
    }

    /// `SELECT cols FROM t WHERE ... ORDER BY ... LIMIT ... OFFSET ...`
    pub fn sql_for_list(
        &self,
        opt: &ListOption,
        where_opt: Option<&SqlWhereOption>,
    ) -> Result<Statement> {
        let schema = T::schema();
        self.validate_filter(&opt.filter)?;

        let fields: Vec<&str> = if opt.fields.is_empty() {
            schema.field_names()
        } else {
            for f in &opt.fields {
                if !schema.contains(f) {
                    return Err(DalError::InvalidFilter(format!(
                        "unknown column {} in {}",
                        f,
                        schema.table()
                    )));
                }
            }
            opt.fields.iter().map(String::as_str).collect()
        };

        let mut bindings = Bindings::new();
        let default_opt = SqlWhereOption::default();
        let where_expr = opt
            .filter
            .sql_where(where_opt.unwrap_or(&default_opt), &mut bindings)?;

        let page_expr = match &opt.page {
            Some(page) => {
                if let Some(sort) = &page.sort {
                    if !schema.contains(sort) {
                        return Err(DalError::InvalidPage(format!(
                            "unknown sort column {}",
                            sort
                        )));
                    }
                }
                page.sql_expr(ID_FIELD)?
            }
            None => String::new(),
        };

        let sql = [
            format!("SELECT {} FROM {}", fields.join(", "), schema.table()),
            where_expr,
            page_expr,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(Statement {
            sql,
            args: bindings.into_values(),
        })
    }

    /// `DELETE FROM t WHERE ...`
    pub fn sql_for_delete(&self, expr: &Expression) -> Result<Statement> {
        if expr.is_empty() {
            return Err(DalError::InvalidFilter(
                "delete requires a non-empty filter".to_string(),
            ));
        }
        self.validate_filter(expr)?;

        let mut bindings = Bindings::new();
        let where_expr = expr.sql_where(&SqlWhereOption::default(), &mut bindings)?;
        Ok(Statement {
            sql: format!("DELETE FROM {} {}", self.table_name(), where_expr),
            args: bindings.into_values(),
        })
    }

    fn validate_filter(&self, expr: &Expression) -> Result<()> {
        let schema = T::schema();
        expr.validate(&|f| schema.contains(f))
    }
}
