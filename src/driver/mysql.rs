//! Pooled MySQL driver (§4.4, §5, §6).
//!
//! Unlike the SQLite driver, there is no snapshot-to-disk dance and no
//! single-connection mutex — `sqlx`'s pool hands out a connection per
//! operation and MySQL itself serializes writes. `regexp`/
//! `json_array_contains` need no UDF registration here: MySQL's native
//! `REGEXP` operator and `JSON_CONTAINS` cover them, and
//! [`crate::sql::dialect::mysql::MySql::remap_function`] already points the
//! query compiler at the native names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use super::{is_literal_false, is_literal_true, root_fields, Driver, Selection, Stats, TableStats};
use crate::builder::QueryBuilder;
use crate::caster::Caster;
use crate::config::{MySqlConfig, PoolSettings};
use crate::error::{Error, Result};
use crate::model::ModelRegistry;
use crate::query_expr::{EvalExpr, QueryExpr};
use crate::schema::{LiveColumn, Synchronizer};
use crate::sql::ddl::DropTable;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::dml::{Delete, Insert, Update};
use crate::value::Value;

struct Inner {
    config: MySqlConfig,
    pool_settings: PoolSettings,
    registry: Arc<RwLock<ModelRegistry>>,
    caster: Caster,
    pool: AsyncMutex<Option<MySqlPool>>,
}

/// A pooled handle to one MySQL database. Cheap to clone — internally an
/// `Arc` sharing the same pool.
#[derive(Clone)]
pub struct MySqlDriver {
    inner: Arc<Inner>,
}

impl MySqlDriver {
    pub fn new(config: MySqlConfig, pool_settings: PoolSettings, registry: Arc<RwLock<ModelRegistry>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                pool_settings,
                registry,
                caster: Caster::new(),
                pool: AsyncMutex::new(None),
            }),
        }
    }

    async fn upsert_chunk(
        &self,
        table: &str,
        keys: &[String],
        columns: &[String],
        update_fields: &[String],
        items: &[HashMap<String, Value>],
    ) -> Result<()> {
        let _ = keys;
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            Dialect::MySql.quote_identifier(table),
            columns.iter().map(|c| Dialect::MySql.quote_identifier(c)).collect::<Vec<_>>().join(", "),
        );

        let value_groups: Vec<String> = items
            .iter()
            .map(|item| {
                let rendered: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let v = item.get(c).cloned().unwrap_or(Value::Null);
                        crate::escape::escape_value(Dialect::MySql, &v).to_tokens_for_dialect(Dialect::MySql).serialize(Dialect::MySql)
                    })
                    .collect();
                format!("({})", rendered.join(", "))
            })
            .collect();
        sql.push_str(&value_groups.join(", "));

        sql.push_str(" ON DUPLICATE KEY UPDATE ");
        let sets: Vec<String> = update_fields
            .iter()
            .map(|f| {
                let col = Dialect::MySql.quote_identifier(f);
                format!("{col} = IF(VALUES({col}) <> {col}, VALUES({col}), {col})")
            })
            .collect();
        sql.push_str(&sets.join(", "));

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        sqlx::query(&sql).execute(pool).await.map_err(|e| map_err(e, &sql))?;
        Ok(())
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn start(&self) -> Result<()> {
        let mut guard = self.inner.pool.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let pool = MySqlPoolOptions::new()
            .max_connections(self.inner.pool_settings.max_open_conns)
            .min_connections(self.inner.pool_settings.max_idle_conns)
            .max_lifetime(parse_duration(&self.inner.pool_settings.conn_max_lifetime))
            .idle_timeout(parse_duration(&self.inner.pool_settings.conn_max_idle_time))
            .connect(&self.inner.config.to_url())
            .await
            .map_err(|e| Error::storage(e, None))?;
        *guard = Some(pool);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut guard = self.inner.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn prepare(&self, table: &str) -> Result<()> {
        let registry = self.inner.registry.read().await;
        let model = registry.get(table).ok_or_else(|| Error::query_malformed(format!("unknown table `{table}`")))?;

        let live = {
            let guard = self.inner.pool.lock().await;
            let pool = guard.as_ref().ok_or_else(not_started)?;
            live_columns(pool, &self.inner.config.database, table).await?
        };

        let plan = Synchronizer::plan(model, Dialect::MySql, &live)?;
        if plan.is_noop {
            return Ok(());
        }

        {
            let guard = self.inner.pool.lock().await;
            let pool = guard.as_ref().ok_or_else(not_started)?;
            for sql in &plan.statements {
                sqlx::query(sql).execute(pool).await.map_err(|e| map_err(e, sql))?;
            }
        }

        if let Some(hooks) = &model.hooks {
            let mut drop_safe = Vec::new();
            if let Some(before) = &hooks.before {
                drop_safe.extend(before());
            }
            if let Some(after) = &hooks.after {
                drop_safe.extend(after());
            }
            if let Some(finalize) = &hooks.finalize {
                drop_safe.extend(finalize());
            }
            if let Some(drop_sql) = Synchronizer::drop_columns_statement(table, &drop_safe, Dialect::MySql) {
                let guard = self.inner.pool.lock().await;
                let pool = guard.as_ref().ok_or_else(not_started)?;
                sqlx::query(&drop_sql).execute(pool).await.map_err(|e| map_err(e, &drop_sql))?;
            }
        }

        Ok(())
    }

    async fn drop_table(&self, table: Option<&str>) -> Result<()> {
        let registry = self.inner.registry.read().await;
        let tables: Vec<String> = match table {
            Some(t) => vec![t.to_string()],
            None => registry.tables().map(|s| s.to_string()).collect(),
        };
        drop(registry);

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        for t in &tables {
            let sql = DropTable::new(t).if_exists().to_sql(Dialect::MySql);
            sqlx::query(&sql).execute(pool).await.map_err(|e| map_err(e, &sql))?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let registry = self.inner.registry.read().await;
        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;

        let mut tables = HashMap::new();
        for table in registry.tables() {
            let sql = format!("SELECT COUNT(*) AS c FROM {}", Dialect::MySql.quote_identifier(table));
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await.unwrap_or(0);
            tables.insert(table.to_string(), TableStats { count: count as u64, size: 0 });
        }

        let size_sql = "SELECT COALESCE(SUM(data_length + index_length), 0) FROM information_schema.tables WHERE table_schema = ?";
        let size: i64 = sqlx::query_scalar(size_sql)
            .bind(&self.inner.config.database)
            .fetch_one(pool)
            .await
            .unwrap_or(0);
        Ok(Stats { size: size.max(0) as u64, tables })
    }

    async fn get(&self, sel: &Selection) -> Result<Vec<HashMap<String, Value>>> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::MySql);
        let query = builder.compile_get(&sel.table, &sel.filter, sel.fields.as_deref(), &sel.sort, sel.limit, sel.offset)?;
        let Some(query) = query else {
            return Ok(Vec::new());
        };
        let sql = query.to_sql(Dialect::MySql);

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        let rows = sqlx::query(&sql).fetch_all(pool).await.map_err(|e| map_err(e, &sql))?;

        let mapped: Vec<HashMap<String, Value>> = rows.iter().map(row_to_map).collect();
        // As on SQLite, a custom projection selects computed aliases, not
        // declared columns — skip the caster's per-field lookup for those.
        if sel.fields.is_some() {
            return Ok(mapped);
        }
        mapped.into_iter().map(|r| self.inner.caster.load(model, Dialect::MySql, &r)).collect()
    }

    async fn eval(&self, sel: &Selection, expr: &EvalExpr) -> Result<Value> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::MySql);
        let fields = vec![("value".to_string(), expr.clone())];
        let query = builder.compile_get(&sel.table, &sel.filter, Some(&fields), &[], None, None)?;
        let Some(query) = query else {
            return Ok(Value::Null);
        };
        let sql = query.to_sql(Dialect::MySql);

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        let row = sqlx::query(&sql).fetch_one(pool).await.map_err(|e| map_err(e, &sql))?;
        let map = row_to_map(&row);
        let raw = map.get("value").cloned().unwrap_or(Value::Null);

        let cast_ty = match expr {
            EvalExpr::Path(p) => QueryExpr::path_segments(p).first().and_then(|root| model.field(root)).map(|f| f.ty),
            _ => None,
        };
        Ok(match cast_ty.and_then(|ty| self.inner.caster.plugin_for(ty)) {
            Some(plugin) => plugin.load(&raw, Dialect::MySql),
            None => raw,
        })
    }

    async fn set(&self, sel: &Selection, update: &[(String, EvalExpr)]) -> Result<u64> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::MySql);
        let where_clause = builder.parse_query(&sel.filter)?;
        if is_literal_false(&where_clause) {
            return Ok(0);
        }
        let set_pairs = builder.compile_set(update)?;
        drop(registry);

        let mut stmt = Update::table(&sel.table);
        for (col, expr) in set_pairs {
            stmt = stmt.set(col, expr);
        }
        if !is_literal_true(&where_clause) {
            stmt = stmt.filter(where_clause);
        }
        let sql = stmt.to_sql(Dialect::MySql);

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        let result = sqlx::query(&sql).execute(pool).await.map_err(|e| map_err(e, &sql))?;
        Ok(result.rows_affected())
    }

    async fn remove(&self, sel: &Selection) -> Result<u64> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::MySql);
        let where_clause = builder.parse_query(&sel.filter)?;
        if is_literal_false(&where_clause) {
            return Ok(0);
        }
        drop(registry);

        let mut stmt = Delete::from(&sel.table);
        if !is_literal_true(&where_clause) {
            stmt = stmt.filter(where_clause);
        }
        let sql = stmt.to_sql(Dialect::MySql);

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        let result = sqlx::query(&sql).execute(pool).await.map_err(|e| map_err(e, &sql))?;
        Ok(result.rows_affected())
    }

    async fn create(&self, table: &str, data: HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let registry = self.inner.registry.read().await;
        let model = registry.get(table).ok_or_else(|| Error::query_malformed(format!("unknown table `{table}`")))?;
        let dumped = self.inner.caster.dump(model, &data);

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in model.active_fields() {
            // As on SQLite, only join the primary key into the column list
            // when the caller supplied one explicitly.
            if let Some(v) = dumped.get(&field.name) {
                columns.push(field.name.clone());
                values.push(crate::escape::escape_value(Dialect::MySql, v));
            }
        }

        let insert = Insert::into(table).columns(columns).values(values);
        let sql = insert.to_sql(Dialect::MySql);

        let guard = self.inner.pool.lock().await;
        let pool = guard.as_ref().ok_or_else(not_started)?;
        let result = sqlx::query(&sql).execute(pool).await.map_err(|e| map_err(e, &sql))?;
        // MySQL's LAST_INSERT_ID() is 0 when the row supplied its own
        // AUTO_INCREMENT value explicitly (nothing was auto-generated) — in
        // that case the caller's own value is the id, not 0.
        let primary_name = model.primary_key().name.clone();
        let id = match dumped.get(&primary_name).and_then(Value::as_int) {
            Some(explicit) => explicit,
            None => result.last_insert_id() as i64,
        };

        let mut row = data;
        row.insert(primary_name, Value::Int(id));
        for field in model.active_fields() {
            row.entry(field.name.clone()).or_insert_with(|| field.initial.clone().unwrap_or(Value::Null));
        }
        Ok(row)
    }

    async fn upsert(&self, table: &str, keys: &[String], data: Vec<HashMap<String, Value>>) -> Result<()> {
        if data.is_empty() || keys.is_empty() {
            return Ok(());
        }
        let registry = self.inner.registry.read().await;
        let model = registry.get(table).ok_or_else(|| Error::query_malformed(format!("unknown table `{table}`")))?;
        let dumped: Vec<HashMap<String, Value>> = data.iter().map(|item| self.inner.caster.dump(model, item)).collect();
        drop(registry);

        let data_fields = root_fields(dumped.iter().flat_map(|item| item.keys().map(|s| s.as_str())));
        let mut update_fields: Vec<String> = data_fields.iter().filter(|f| !keys.contains(f)).cloned().collect();
        if update_fields.is_empty() {
            if let Some(first) = data_fields.first() {
                update_fields.push(first.clone());
            }
        }

        // A single multi-row INSERT ... ON DUPLICATE KEY UPDATE; 65535
        // placeholders is the protocol ceiling but we render literals
        // directly, so chunk generously to keep any one statement readable.
        let chunk_size = (4000 / data_fields.len().max(1)).max(1);
        for chunk in dumped.chunks(chunk_size) {
            self.upsert_chunk(table, keys, &data_fields, &update_fields, chunk).await?;
        }
        Ok(())
    }
}

fn not_started() -> Error {
    Error::storage(NotStarted, None)
}

#[derive(Debug)]
struct NotStarted;

impl std::fmt::Display for NotStarted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mysql driver has not been started")
    }
}

impl std::error::Error for NotStarted {}

fn map_err(e: sqlx::Error, sql: &str) -> Error {
    match Error::from(e) {
        Error::StorageError { source, .. } => Error::StorageError { source, sql: Some(sql.to_string()) },
        other => other,
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, suffix) = s.split_at(s.len().saturating_sub(1));
    let n: u64 = digits.parse().ok()?;
    match suffix {
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n * 60)),
        "h" => Some(Duration::from_secs(n * 3600)),
        _ => None,
    }
}

fn row_to_map(row: &MySqlRow) -> HashMap<String, Value> {
    let mut map = HashMap::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), mysql_cell(row, i, column.type_info().name()));
    }
    map
}

fn mysql_cell(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
        return Value::Null;
    }
    match type_name {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INT24" | "BIGINT" | "YEAR" => {
            row.try_get::<i64, _>(idx).map(Value::Int).unwrap_or(Value::Null)
        }
        "FLOAT" => row.try_get::<f32, _>(idx).map(|f| Value::Float(f as f64)).unwrap_or(Value::Null),
        "DOUBLE" | "DECIMAL" | "NEWDECIMAL" => row.try_get::<f64, _>(idx).map(Value::Float).unwrap_or(Value::Null),
        _ => row.try_get::<String, _>(idx).map(Value::String).unwrap_or(Value::Null),
    }
}

async fn live_columns(pool: &MySqlPool, schema: &str, table: &str) -> Result<Vec<LiveColumn>> {
    let sql = "SELECT column_name FROM information_schema.columns WHERE table_schema = ? AND table_name = ?";
    let names: Vec<String> = sqlx::query_scalar(sql)
        .bind(schema)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| map_err(e, sql))?;
    Ok(names.into_iter().map(LiveColumn::new).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("bogus"), None);
    }
}
