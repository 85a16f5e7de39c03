//! Async driver protocol (§4.4): each engine implements one operation set
//! over an async-trait interface. Every method that reaches the database
//! may suspend; query compilation ([`crate::builder::QueryBuilder`]) never
//! does (§5) — the full SQL string is always built before the first
//! suspension point, so a cancelled call either completes fully or leaves
//! the database untouched.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::builder::as_literal_bool;
use crate::error::Result;
use crate::query_expr::{EvalExpr, QueryExpr};
use crate::sql::expr::Expr;
use crate::value::Value;

pub mod mysql;
pub mod sqlite;

pub use mysql::MySqlDriver;
pub use sqlite::SqliteDriver;

/// One `get`/`eval`/`set`/`remove` target against a single table.
#[derive(Debug, Clone)]
#[must_use = "a Selection has no effect until passed to a Driver method"]
pub struct Selection {
    pub table: String,
    pub filter: QueryExpr,
    /// Projection: `(alias, expression)`. `None` selects every declared
    /// column (`SELECT *`).
    pub fields: Option<Vec<(String, EvalExpr)>>,
    pub sort: Vec<(EvalExpr, bool)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Selection {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: QueryExpr::all(),
            fields: None,
            sort: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn filter(mut self, filter: QueryExpr) -> Self {
        self.filter = filter;
        self
    }

    pub fn fields(mut self, fields: Vec<(String, EvalExpr)>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn sort(mut self, sort: Vec<(EvalExpr, bool)>) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Row count and storage footprint for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub count: u64,
    pub size: u64,
}

/// Aggregate counters returned by `stats()` (§4.4, §6).
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub size: u64,
    pub tables: HashMap<String, TableStats>,
}

/// The per-engine transport: SQLite (embedded, single connection, §4.4) or
/// MySQL (pooled). A driver owns the [`crate::model::ModelRegistry`] it was
/// constructed with and consults it on every call that needs field types.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Acquire the connection/pool and register UDFs (§6).
    async fn start(&self) -> Result<()>;

    /// Close the connection/pool. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Synchronize one table's schema to its declared model (§4.5).
    /// Idempotent: a second call against an already-synchronized schema
    /// issues no DDL.
    async fn prepare(&self, table: &str) -> Result<()>;

    /// Drop one table, or every registered table when `table` is `None`.
    async fn drop_table(&self, table: Option<&str>) -> Result<()>;

    /// Aggregate row counts and storage size, per registered table.
    async fn stats(&self) -> Result<Stats>;

    /// Rows matching `sel`, each passed through `Caster::load`.
    async fn get(&self, sel: &Selection) -> Result<Vec<HashMap<String, Value>>>;

    /// `sel` wrapped as a subquery filter; evaluate `expr` as the single
    /// projected column and return it loaded.
    async fn eval(&self, sel: &Selection, expr: &EvalExpr) -> Result<Value>;

    /// Update rows matching `sel.filter`. Returns the number of rows
    /// touched.
    async fn set(&self, sel: &Selection, update: &[(String, EvalExpr)]) -> Result<u64>;

    /// Delete rows matching `sel.filter`. A filter that reduces to
    /// always-false is a no-op (§4.3).
    async fn remove(&self, sel: &Selection) -> Result<u64>;

    /// Insert one row, returning the stored row including any generated
    /// auto-increment id.
    async fn create(&self, table: &str, data: HashMap<String, Value>) -> Result<HashMap<String, Value>>;

    /// For each item: update the row uniquely identified by `keys` if one
    /// exists, else insert it with model defaults applied (§4.4).
    async fn upsert(&self, table: &str, keys: &[String], data: Vec<HashMap<String, Value>>) -> Result<()>;
}

/// Given a set of update/data keys (possibly dotted JSON accessor paths),
/// collapse to the distinct set of root field names they touch. Shared by
/// both drivers' `set`/`upsert` implementations (§4.4's `dataFields`/
/// `updateFields` derivation).
pub(crate) fn root_fields<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for k in keys {
        let root = crate::query_expr::QueryExpr::path_segments(k)[0].to_string();
        if !seen.contains(&root) {
            seen.push(root);
        }
    }
    seen
}

/// Whether a compiled `WHERE` expression reduced to the literal `false`
/// short-circuit (§4.3) — `set`/`remove` skip touching the connection
/// entirely in that case.
pub(crate) fn is_literal_false(e: &Expr) -> bool {
    as_literal_bool(e) == Some(false)
}

/// Whether a compiled `WHERE` expression reduced to the literal `true`
/// match-all case — `set`/`remove` omit the `WHERE` clause entirely rather
/// than emit `WHERE TRUE`.
pub(crate) fn is_literal_true(e: &Expr) -> bool {
    as_literal_bool(e) == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_fields_dedupes_and_collapses_dotted_paths() {
        assert_eq!(root_fields(["meta.a", "meta.b", "num"]), vec!["meta".to_string(), "num".to_string()]);
    }

    #[test]
    fn selection_builder_defaults_to_match_all() {
        let sel = Selection::new("bar");
        assert_eq!(sel.filter, QueryExpr::all());
        assert!(sel.fields.is_none());
    }
}
