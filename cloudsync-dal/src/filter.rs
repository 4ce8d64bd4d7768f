//! Filter expressions and their translation to parameterized WHERE clauses.
//!
//! A filter is a tree: leaves are atomic `{field, op, value}` comparisons,
//! inner nodes combine their children with AND or OR. The JSON wire shape
//! is the same tree:
//!
//! ```json
//! {"op": "and", "rules": [
//!     {"field": "vendor", "op": "eq", "value": "aws"},
//!     {"field": "region_id", "op": "in", "value": ["us-east-1", "eu-west-1"]}
//! ]}
//! ```
//!
//! Only field names (checked to be identifiers, and by the table layer to be
//! schema columns) and operator keywords from a fixed allow-list ever appear
//! in the generated SQL text. Every value is bound through a numbered
//! placeholder collected in [`Bindings`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DalError, Result};

/// Maximum number of elements accepted by `in` / `nin`.
pub const MAX_IN_LIMIT: usize = 500;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Null)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Ordered placeholder values of a statement under construction.
///
/// Placeholders are numbered (`?1`, `?2`, ...) in the order values are
/// pushed, so the N-th value always binds to `?N` no matter where the
/// placeholder lands in the statement text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    args: Vec<Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value and return the placeholder that refers to it.
    pub fn push(&mut self, value: Value) -> String {
        self.args.push(value);
        format!("?{}", self.args.len())
    }

    pub fn values(&self) -> &[Value] {
        &self.args
    }

    pub fn into_values(self) -> Vec<Value> {
        self.args
    }
}

/// Logical combinator of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    fn sql(self) -> &'static str {
        match self {
            LogicOp::And => " AND ",
            LogicOp::Or => " OR ",
        }
    }
}

/// Comparison operator of an atomic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "eq")]
    Equal,
    #[serde(rename = "neq")]
    NotEqual,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterThanEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessThanEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "nin")]
    NotIn,
    /// Substring match, case-sensitive.
    #[serde(rename = "cs")]
    ContainsSensitive,
    /// Substring match, case-insensitive.
    #[serde(rename = "cis")]
    ContainsInsensitive,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Equal => "eq",
            Operator::NotEqual => "neq",
            Operator::GreaterThan => "gt",
            Operator::GreaterThanEqual => "gte",
            Operator::LessThan => "lt",
            Operator::LessThanEqual => "lte",
            Operator::In => "in",
            Operator::NotIn => "nin",
            Operator::ContainsSensitive => "cs",
            Operator::ContainsInsensitive => "cis",
        };
        f.write_str(s)
    }
}

/// An atomic `{field, op, value}` comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomRule {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl AtomRule {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Check the operator/value pairing. Field membership is the table's job.
    fn check(&self) -> Result<()> {
        if !is_identifier(&self.field) {
            return Err(DalError::InvalidFilter(format!(
                "field {:?} is not a valid column name",
                self.field
            )));
        }

        let ok = match self.op {
            Operator::Equal | Operator::NotEqual => !matches!(self.value, Value::List(_)),
            Operator::GreaterThan
            | Operator::GreaterThanEqual
            | Operator::LessThan
            | Operator::LessThanEqual => {
                matches!(self.value, Value::Int(_) | Value::Float(_) | Value::Text(_))
            }
            Operator::In | Operator::NotIn => match &self.value {
                Value::List(items) => {
                    if items.is_empty() || items.len() > MAX_IN_LIMIT {
                        return Err(DalError::InvalidFilter(format!(
                            "{} on {} needs 1..={} values, got {}",
                            self.op,
                            self.field,
                            MAX_IN_LIMIT,
                            items.len()
                        )));
                    }
                    items.iter().all(Value::is_scalar)
                }
                _ => false,
            },
            Operator::ContainsSensitive | Operator::ContainsInsensitive => {
                matches!(self.value, Value::Text(_))
            }
        };

        if !ok {
            return Err(DalError::InvalidFilter(format!(
                "operator {} does not accept value {:?} on field {}",
                self.op, self.value, self.field
            )));
        }
        Ok(())
    }

    fn sql(&self, bindings: &mut Bindings) -> Result<String> {
        self.check()?;
        let field = &self.field;

        let sql = match (self.op, &self.value) {
            (Operator::Equal, Value::Null) => format!("{} IS NULL", field),
            (Operator::NotEqual, Value::Null) => format!("{} IS NOT NULL", field),
            (Operator::Equal, v) => format!("{} = {}", field, bindings.push(v.clone())),
            (Operator::NotEqual, v) => format!("{} <> {}", field, bindings.push(v.clone())),
            (Operator::GreaterThan, v) => format!("{} > {}", field, bindings.push(v.clone())),
            (Operator::GreaterThanEqual, v) => {
                format!("{} >= {}", field, bindings.push(v.clone()))
            }
            (Operator::LessThan, v) => format!("{} < {}", field, bindings.push(v.clone())),
            (Operator::LessThanEqual, v) => format!("{} <= {}", field, bindings.push(v.clone())),
            (Operator::In | Operator::NotIn, Value::List(items)) => {
                let placeholders: Vec<String> =
                    items.iter().map(|v| bindings.push(v.clone())).collect();
                let keyword = if self.op == Operator::In {
                    "IN"
                } else {
                    "NOT IN"
                };
                format!("{} {} ({})", field, keyword, placeholders.join(", "))
            }
            (Operator::ContainsSensitive, v) => {
                format!("instr({}, {}) > 0", field, bindings.push(v.clone()))
            }
            (Operator::ContainsInsensitive, v) => format!(
                "instr(lower({}), lower({})) > 0",
                field,
                bindings.push(v.clone())
            ),
            // check() rejects every other pairing
            (op, _) => {
                return Err(DalError::InvalidFilter(format!(
                    "unsupported operator {}",
                    op
                )));
            }
        };
        Ok(sql)
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Atom(AtomRule),
    Expr(Expression),
}

impl From<AtomRule> for Rule {
    fn from(r: AtomRule) -> Self {
        Rule::Atom(r)
    }
}

impl From<Expression> for Rule {
    fn from(e: Expression) -> Self {
        Rule::Expr(e)
    }
}

/// Options controlling WHERE clause generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlWhereOption {
    /// Fields whose atoms are emitted first in the root conjunction, in
    /// this order. Keeps index-friendly columns leading.
    pub priority: Vec<String>,
}

impl Default for SqlWhereOption {
    fn default() -> Self {
        Self {
            priority: vec!["id".to_string()],
        }
    }
}

/// A combinator node: `rules` joined by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expression {
    pub op: LogicOp,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Expression {
    pub fn and(rules: Vec<Rule>) -> Self {
        Self {
            op: LogicOp::And,
            rules,
        }
    }

    pub fn or(rules: Vec<Rule>) -> Self {
        Self {
            op: LogicOp::Or,
            rules,
        }
    }

    /// An expression matching every row.
    pub fn all() -> Self {
        Self::and(Vec::new())
    }

    /// `field = value`
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Self::and(vec![AtomRule::new(field, Operator::Equal, value).into()])
    }

    /// `field IN (values...)`
    pub fn in_set<T: Into<Value>>(field: &str, values: Vec<T>) -> Self {
        Self::and(vec![AtomRule::new(field, Operator::In, values).into()])
    }

    /// Add a rule to this node.
    pub fn push(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every field name referenced anywhere in the tree.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        for rule in &self.rules {
            match rule {
                Rule::Atom(a) => out.push(a.field.as_str()),
                Rule::Expr(e) => e.collect_fields(out),
            }
        }
    }

    /// Validate the tree. `known` decides whether a field is a column of
    /// the target table.
    pub fn validate(&self, known: &dyn Fn(&str) -> bool) -> Result<()> {
        self.validate_node(known, true)
    }

    fn validate_node(&self, known: &dyn Fn(&str) -> bool, root: bool) -> Result<()> {
        if !root && self.rules.is_empty() {
            return Err(DalError::InvalidFilter(
                "nested expression has no rules".to_string(),
            ));
        }
        for rule in &self.rules {
            match rule {
                Rule::Atom(a) => {
                    a.check()?;
                    if !known(&a.field) {
                        return Err(DalError::InvalidFilter(format!(
                            "unknown field {}",
                            a.field
                        )));
                    }
                }
                Rule::Expr(e) => e.validate_node(known, false)?,
            }
        }
        Ok(())
    }

    /// Render `WHERE ...`, or an empty string when the root has no rules.
    pub fn sql_where(&self, opt: &SqlWhereOption, bindings: &mut Bindings) -> Result<String> {
        if self.rules.is_empty() {
            return Ok(String::new());
        }
        let body = self.sql_node(Some(opt), bindings)?;
        Ok(format!("WHERE {}", body))
    }

    fn sql_node(&self, opt: Option<&SqlWhereOption>, bindings: &mut Bindings) -> Result<String> {
        if self.rules.is_empty() {
            return Err(DalError::InvalidFilter(
                "nested expression has no rules".to_string(),
            ));
        }

        let mut ordered: Vec<&Rule> = self.rules.iter().collect();
        if let (Some(opt), LogicOp::And) = (opt, self.op) {
            let rank = |rule: &&Rule| match rule {
                Rule::Atom(a) => opt
                    .priority
                    .iter()
                    .position(|p| *p == a.field)
                    .unwrap_or(opt.priority.len()),
                Rule::Expr(_) => opt.priority.len(),
            };
            ordered.sort_by_key(rank);
        }

        let mut parts = Vec::with_capacity(ordered.len());
        for rule in ordered {
            let part = match rule {
                Rule::Atom(a) => a.sql(bindings)?,
                Rule::Expr(e) => format!("({})", e.sql_node(None, bindings)?),
            };
            parts.push(part);
        }
        Ok(parts.join(self.op.sql()))
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
