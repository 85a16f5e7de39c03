//! Embedded SQLite driver (§4.4, §5, §6).
//!
//! The live connection is always in-memory — `rusqlite`'s `serialize`
//! feature lets a real file on disk be just a snapshot of that connection's
//! state rather than the thing SQLite itself writes to. Every mutation
//! schedules a debounced flush (coalescing multiple writes within one
//! tick) that serializes the connection and atomically replaces the
//! configured path; `:memory:` skips the snapshot step entirely.
//!
//! Single connection, single `tokio::sync::Mutex` — matching §5's "no
//! explicit cross-operation locks in core; drivers serialize internally."

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use super::{is_literal_false, is_literal_true, root_fields, Driver, Selection, Stats, TableStats};
use crate::builder::QueryBuilder;
use crate::caster::Caster;
use crate::config::SqliteConfig;
use crate::error::{Error, Result};
use crate::model::ModelRegistry;
use crate::query_expr::{EvalExpr, QueryExpr};
use crate::schema::{LiveColumn, Synchronizer};
use crate::sql::ddl::DropTable;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::dml::{Delete, Insert, Update};
use crate::sql::expr::{col, BinaryOperator, Expr};
use crate::value::Value;

fn binop_eq(column: &str, value: Expr) -> Expr {
    Expr::BinaryOp { left: Box::new(col(column)), op: BinaryOperator::Eq, right: Box::new(value) }
}

struct Inner {
    config: SqliteConfig,
    registry: Arc<RwLock<ModelRegistry>>,
    caster: Caster,
    conn: AsyncMutex<Option<Connection>>,
    /// Bumped on every write; a pending flush task bails out if a newer
    /// write superseded it, so a burst of writes in one tick coalesces into
    /// a single snapshot.
    flush_generation: AtomicU64,
}

/// A connection handle to one SQLite file (or `:memory:` database).
/// Cheap to clone — internally an `Arc`, so a clone shares the same
/// connection and debounce state.
#[derive(Clone)]
pub struct SqliteDriver {
    inner: Arc<Inner>,
}

impl SqliteDriver {
    pub fn new(config: SqliteConfig, registry: Arc<RwLock<ModelRegistry>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                caster: Caster::new(),
                conn: AsyncMutex::new(None),
                flush_generation: AtomicU64::new(0),
            }),
        }
    }

    fn schedule_flush(&self) {
        if self.inner.config.is_memory() {
            return;
        }
        let generation = self.inner.flush_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if inner.flush_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(err) = flush_to_disk(&inner).await {
                tracing::warn!(error = %err, path = %inner.config.path, "sqlite snapshot flush failed");
            }
        });
    }

    async fn upsert_chunk(
        &self,
        table: &str,
        keys: &[String],
        update_fields: &[String],
        items: &[HashMap<String, Value>],
    ) -> Result<()> {
        let key_tuple = |item: &HashMap<String, Value>| -> QueryExpr {
            QueryExpr::and(keys.iter().map(|k| QueryExpr::eq(k.clone(), item.get(k).cloned().unwrap_or(Value::Null))).collect())
        };

        let or_clauses = items.iter().map(key_tuple).collect();
        let existing = self.get(&Selection::new(table).filter(QueryExpr::or(or_clauses))).await?;

        for item in items {
            let existing_row = existing.iter().find(|row| keys.iter().all(|k| row.get(k) == item.get(k)));
            // Only fields the item actually touches participate in the diff and the
            // UPDATE — an absent field means "keep the existing value" (§4.4's
            // merge(existing_or_model_default, I)), not "set to null".
            let touched = |f: &&String| item.contains_key(f.as_str());
            match existing_row {
                Some(row) if update_fields.iter().filter(touched).all(|f| row.get(f) == item.get(f)) => {}
                Some(_) => {
                    let set: Vec<(String, EvalExpr)> = update_fields
                        .iter()
                        .filter(touched)
                        .map(|f| (f.clone(), EvalExpr::lit(item.get(f).cloned().unwrap())))
                        .collect();
                    if !set.is_empty() {
                        self.set(&Selection::new(table).filter(key_tuple(item)), &set).await?;
                    }
                }
                None => {
                    self.create(table, item.clone()).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn start(&self) -> Result<()> {
        let mut guard = self.inner.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let conn = if self.inner.config.is_memory() {
            Connection::open_in_memory()?
        } else {
            match tokio::fs::read(&self.inner.config.path).await {
                Ok(bytes) => {
                    let conn = Connection::open_in_memory()?;
                    conn.deserialize(rusqlite::DatabaseName::Main, bytes, None)?;
                    conn
                }
                Err(_) => Connection::open_in_memory()?,
            }
        };
        register_udfs(&conn)?;
        *guard = Some(conn);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut guard = self.inner.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            if !self.inner.config.is_memory() {
                let bytes = conn.serialize(rusqlite::DatabaseName::Main)?.to_vec();
                tokio::fs::write(&self.inner.config.path, &bytes).await.map_err(|e| Error::storage(e, None))?;
            }
        }
        *guard = None;
        Ok(())
    }

    async fn prepare(&self, table: &str) -> Result<()> {
        let registry = self.inner.registry.read().await;
        let model = registry.get(table).ok_or_else(|| Error::query_malformed(format!("unknown table `{table}`")))?;

        let live = {
            let guard = self.inner.conn.lock().await;
            let conn = guard.as_ref().ok_or_else(not_started)?;
            live_columns(conn, table)?
        };

        let plan = Synchronizer::plan(model, Dialect::Sqlite, &live)?;
        if plan.is_noop {
            return Ok(());
        }

        {
            let guard = self.inner.conn.lock().await;
            let conn = guard.as_ref().ok_or_else(not_started)?;
            for sql in &plan.statements {
                if let Err(e) = conn.execute_batch(sql) {
                    if let Some(temp) = &plan.rebuild_temp_table {
                        let drop_sql = format!("DROP TABLE IF EXISTS {}", Dialect::Sqlite.quote_identifier(temp));
                        let _ = conn.execute_batch(&drop_sql);
                    }
                    return Err(map_err(e, sql));
                }
            }
        }
        self.schedule_flush();

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
            if let Some(drop_sql) = Synchronizer::drop_columns_statement(table, &drop_safe, Dialect::Sqlite) {
                let guard = self.inner.conn.lock().await;
                let conn = guard.as_ref().ok_or_else(not_started)?;
                conn.execute_batch(&drop_sql).map_err(|e| map_err(e, &drop_sql))?;
                drop(guard);
                self.schedule_flush();
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

        let guard = self.inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;
        for t in &tables {
            let sql = DropTable::new(t).if_exists().to_sql(Dialect::Sqlite);
            conn.execute_batch(&sql).map_err(|e| map_err(e, &sql))?;
        }
        drop(guard);
        self.schedule_flush();
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let registry = self.inner.registry.read().await;
        let guard = self.inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;

        let mut tables = HashMap::new();
        for table in registry.tables() {
            let sql = format!("SELECT COUNT(*) FROM {}", Dialect::Sqlite.quote_identifier(table));
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0)).unwrap_or(0);
            tables.insert(table.to_string(), TableStats { count: count as u64, size: 0 });
        }
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0)).unwrap_or(0);
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0)).unwrap_or(0);
        Ok(Stats { size: (page_count * page_size).max(0) as u64, tables })
    }

    async fn get(&self, sel: &Selection) -> Result<Vec<HashMap<String, Value>>> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::Sqlite);
        let query = builder.compile_get(&sel.table, &sel.filter, sel.fields.as_deref(), &sel.sort, sel.limit, sel.offset)?;
        let Some(query) = query else {
            return Ok(Vec::new());
        };
        let sql = query.to_sql(Dialect::Sqlite);

        let guard = self.inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;
        let mut stmt = conn.prepare(&sql).map_err(|e| map_err(e, &sql))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map([], |row| row_to_map(row, &columns))
            .map_err(|e| map_err(e, &sql))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_err(e, &sql))?;

        // A custom projection (`sel.fields`) selects aliases that name
        // computed values, not declared columns — the caster's per-field
        // lookup (and its unknown-key rejection) only applies to a plain
        // full-row select.
        if sel.fields.is_some() {
            return Ok(rows);
        }
        rows.into_iter().map(|r| self.inner.caster.load(model, Dialect::Sqlite, &r)).collect()
    }

    async fn eval(&self, sel: &Selection, expr: &EvalExpr) -> Result<Value> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::Sqlite);
        let fields = vec![("value".to_string(), expr.clone())];
        let query = builder.compile_get(&sel.table, &sel.filter, Some(&fields), &[], None, None)?;
        let Some(query) = query else {
            return Ok(Value::Null);
        };
        let sql = query.to_sql(Dialect::Sqlite);

        let guard = self.inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;
        let raw =
            conn.query_row(&sql, [], |row| Ok(sqlite_value_to_value(row.get_ref(0)?))).map_err(|e| map_err(e, &sql))?;

        let cast_ty = match expr {
            EvalExpr::Path(p) => QueryExpr::path_segments(p).first().and_then(|root| model.field(root)).map(|f| f.ty),
            _ => None,
        };
        Ok(match cast_ty.and_then(|ty| self.inner.caster.plugin_for(ty)) {
            Some(plugin) => plugin.load(&raw, Dialect::Sqlite),
            None => raw,
        })
    }

    /// Embedded-backend `set` strategy (§4.4): fetch matching rows, compute
    /// each row's new values client-side (the update may be an eval
    /// expression referencing the row's own current values), and emit one
    /// `UPDATE ... WHERE <primary key>` per row — as opposed to MySQL's
    /// single SQL-compiled `UPDATE ... SET ...` over the whole filter.
    async fn set(&self, sel: &Selection, update: &[(String, EvalExpr)]) -> Result<u64> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::Sqlite);
        let where_clause = builder.parse_query(&sel.filter)?;
        if is_literal_false(&where_clause) {
            return Ok(0);
        }
        // Validate the update paths the same way the SQL-compiled path
        // does (unknown field / non-json accessor), even though the
        // compiled fragments themselves are discarded here.
        builder.compile_set(update)?;
        let primary = model.primary_key().name.clone();
        drop(registry);

        let rows = self.get(&Selection::new(&sel.table).filter(sel.filter.clone())).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;

        let mut affected = 0u64;
        for row in &rows {
            let mut next = row.clone();
            for (path, expr) in update {
                let value = crate::row_eval::eval_against_row(expr, &next)?;
                crate::row_eval::apply_to_row(&mut next, path, value);
            }
            let dumped = self.inner.caster.dump(model, &next);
            let pk_value = row
                .get(&primary)
                .cloned()
                .ok_or_else(|| Error::query_malformed(format!("row missing primary key `{primary}`")))?;

            let roots = root_fields(update.iter().map(|(path, _)| path.as_str()));
            let mut stmt = Update::table(&sel.table);
            for root in &roots {
                if let Some(v) = dumped.get(root) {
                    stmt = stmt.set(root.clone(), crate::escape::escape_value(Dialect::Sqlite, v));
                }
            }
            stmt = stmt.filter(binop_eq(&primary, crate::escape::escape_value(Dialect::Sqlite, &pk_value)));
            let sql = stmt.to_sql(Dialect::Sqlite);

            let guard = self.inner.conn.lock().await;
            let conn = guard.as_ref().ok_or_else(not_started)?;
            conn.execute(&sql, []).map_err(|e| map_err(e, &sql))?;
            drop(guard);
            affected += 1;
        }
        self.schedule_flush();
        Ok(affected)
    }

    async fn remove(&self, sel: &Selection) -> Result<u64> {
        let registry = self.inner.registry.read().await;
        let model =
            registry.get(&sel.table).ok_or_else(|| Error::query_malformed(format!("unknown table `{}`", sel.table)))?;
        let builder = QueryBuilder::new(model, Dialect::Sqlite);
        let where_clause = builder.parse_query(&sel.filter)?;
        if is_literal_false(&where_clause) {
            return Ok(0);
        }
        drop(registry);

        let mut stmt = Delete::from(&sel.table);
        if !is_literal_true(&where_clause) {
            stmt = stmt.filter(where_clause);
        }
        let sql = stmt.to_sql(Dialect::Sqlite);

        let guard = self.inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;
        let affected = conn.execute(&sql, []).map_err(|e| map_err(e, &sql))?;
        drop(guard);
        self.schedule_flush();
        Ok(affected as u64)
    }

    async fn create(&self, table: &str, data: HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let registry = self.inner.registry.read().await;
        let model = registry.get(table).ok_or_else(|| Error::query_malformed(format!("unknown table `{table}`")))?;
        let dumped = self.inner.caster.dump(model, &data);

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in model.active_fields() {
            // The primary key only joins the column list when the caller
            // supplied one explicitly (e.g. upsert's insert-with-given-keys
            // branch) — otherwise it's left out so AUTOINCREMENT assigns it.
            if let Some(v) = dumped.get(&field.name) {
                columns.push(field.name.clone());
                values.push(crate::escape::escape_value(Dialect::Sqlite, v));
            }
        }

        let insert = Insert::into(table).columns(columns).values(values);
        let sql = insert.to_sql(Dialect::Sqlite);

        let guard = self.inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;
        conn.execute(&sql, []).map_err(|e| map_err(e, &sql))?;
        let id = conn.last_insert_rowid();
        drop(guard);
        self.schedule_flush();

        let mut row = data;
        row.insert(model.primary_key().name.clone(), Value::Int(id));
        for field in model.active_fields() {
            row.entry(field.name.clone()).or_insert_with(|| field.initial.clone().unwrap_or(Value::Null));
        }
        Ok(row)
    }

    async fn upsert(&self, table: &str, keys: &[String], data: Vec<HashMap<String, Value>>) -> Result<()> {
        if data.is_empty() || keys.is_empty() {
            return Ok(());
        }

        let data_fields = root_fields(data.iter().flat_map(|item| item.keys().map(|s| s.as_str())));
        let mut update_fields: Vec<String> = data_fields.iter().filter(|f| !keys.contains(f)).cloned().collect();
        if update_fields.is_empty() {
            if let Some(first) = data_fields.first() {
                update_fields.push(first.clone());
            }
        }

        // Expression-tree ceiling of ~1000 bound parameters per statement:
        // each item in the `$or` contributes `keys.len()` comparisons.
        let chunk_size = (960 / keys.len()).max(1);
        for chunk in data.chunks(chunk_size) {
            self.upsert_chunk(table, keys, &update_fields, chunk).await?;
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
        write!(f, "sqlite driver has not been started")
    }
}

impl std::error::Error for NotStarted {}

fn map_err(e: rusqlite::Error, sql: &str) -> Error {
    match Error::from(e) {
        Error::StorageError { source, .. } => Error::StorageError { source, sql: Some(sql.to_string()) },
        other => other,
    }
}

fn sqlite_value_to_value(vr: ValueRef<'_>) -> Value {
    match vr {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn row_to_map(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<HashMap<String, Value>> {
    let mut map = HashMap::with_capacity(columns.len());
    for (i, name) in columns.iter().enumerate() {
        map.insert(name.clone(), sqlite_value_to_value(row.get_ref(i)?));
    }
    Ok(map)
}

fn live_columns(conn: &Connection, table: &str) -> Result<Vec<LiveColumn>> {
    let sql = format!("PRAGMA table_info({})", Dialect::Sqlite.quote_identifier(table));
    let mut stmt = conn.prepare(&sql).map_err(|e| map_err(e, &sql))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| map_err(e, &sql))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| map_err(e, &sql))?;
    Ok(names.into_iter().map(LiveColumn::new).collect())
}

/// Registers the two UDFs §6 requires: `regexp(pattern, str)` (backing
/// `$regex`/`$regexFor`) and `json_array_contains(array_text, value_text)`
/// (available for callers compiling against a synthesized JSON array
/// directly, e.g. custom eval expressions).
fn register_udfs(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: String = ctx.get(0)?;
            let text: String = ctx.get(1)?;
            let re = regex::Regex::new(&pattern).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            Ok(re.is_match(&text) as i64)
        },
    )?;

    conn.create_scalar_function(
        "json_array_contains",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let array_text: String = ctx.get(0)?;
            let value_text: String = ctx.get(1)?;
            let array: serde_json::Value = serde_json::from_str(&array_text).unwrap_or(serde_json::Value::Null);
            let needle: serde_json::Value = serde_json::from_str(&value_text).unwrap_or(serde_json::Value::Null);
            let found = array.as_array().map(|items| items.contains(&needle)).unwrap_or(false);
            Ok(found as i64)
        },
    )?;

    Ok(())
}

async fn flush_to_disk(inner: &Inner) -> Result<()> {
    let bytes = {
        let guard = inner.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_started)?;
        conn.serialize(rusqlite::DatabaseName::Main)?.to_vec()
    };
    let tmp_path = format!("{}.tmp", inner.config.path);
    tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| Error::storage(e, None))?;
    tokio::fs::rename(&tmp_path, &inner.config.path).await.map_err(|e| Error::storage(e, None))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldType};
    use crate::model::Model;

    fn bar_model() -> Model {
        Model::new(
            "bar",
            vec![
                Field::new("id", FieldType::Primary),
                Field::new("text", FieldType::String),
                Field::new("num", FieldType::Integer),
                Field::new("flag", FieldType::Boolean),
            ],
        )
        .unwrap()
    }

    async fn started_driver() -> SqliteDriver {
        let mut registry = ModelRegistry::new();
        registry.register(bar_model());
        let driver = SqliteDriver::new(SqliteConfig::memory(), Arc::new(RwLock::new(registry)));
        driver.start().await.unwrap();
        driver.prepare("bar").await.unwrap();
        driver
    }

    #[tokio::test]
    async fn prepare_is_idempotent() {
        let driver = started_driver().await;
        driver.prepare("bar").await.unwrap();
    }

    #[tokio::test]
    async fn legacy_alias_rename_preserves_seeded_data_against_live_connection() {
        let registry = Arc::new(RwLock::new(ModelRegistry::new()));
        let driver = SqliteDriver::new(SqliteConfig::memory(), registry.clone());
        driver.start().await.unwrap();

        // Seed a live table under the pre-rename column name, bypassing the
        // model layer entirely — this is the state `prepare` is supposed to
        // find and migrate, not data the driver itself wrote.
        {
            let guard = driver.inner.conn.lock().await;
            let conn = guard.as_ref().unwrap();
            conn.execute("CREATE TABLE bar (id INTEGER PRIMARY KEY, caption TEXT, num INTEGER)", [])
                .unwrap();
            conn.execute("INSERT INTO bar (caption, num) VALUES ('hello', 7)", []).unwrap();
        }

        registry.write().await.register(
            Model::new(
                "bar",
                vec![
                    Field::new("id", FieldType::Primary),
                    Field::new("text", FieldType::String).legacy("caption"),
                    Field::new("num", FieldType::Integer),
                ],
            )
            .unwrap(),
        );

        driver.prepare("bar").await.unwrap();

        let rows = driver.get(&Selection::new("bar").filter(QueryExpr::all())).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("text"), Some(&Value::String("hello".into())));
        assert_eq!(rows[0].get("num"), Some(&Value::Int(7)));
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let driver = started_driver().await;
        let mut data = HashMap::new();
        data.insert("text".to_string(), Value::String("hi".into()));
        data.insert("num".to_string(), Value::Int(3));
        data.insert("flag".to_string(), Value::Bool(true));
        let created = driver.create("bar", data).await.unwrap();
        let id = created.get("id").unwrap().clone();

        let rows = driver.get(&Selection::new("bar").filter(QueryExpr::eq("id", id))).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("text"), Some(&Value::String("hi".into())));
        assert_eq!(rows[0].get("flag"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn set_updates_matching_rows() {
        let driver = started_driver().await;
        let mut data = HashMap::new();
        data.insert("text".to_string(), Value::String("a".into()));
        data.insert("num".to_string(), Value::Int(1));
        data.insert("flag".to_string(), Value::Bool(false));
        driver.create("bar", data).await.unwrap();

        let affected = driver
            .set(
                &Selection::new("bar").filter(QueryExpr::all()),
                &[("num".to_string(), EvalExpr::lit(9i64))],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = driver.get(&Selection::new("bar").filter(QueryExpr::all())).await.unwrap();
        assert_eq!(rows[0].get("num"), Some(&Value::Int(9)));
    }

    #[tokio::test]
    async fn set_evaluates_update_against_each_row_client_side() {
        let driver = started_driver().await;
        for n in [1i64, 10] {
            let mut data = HashMap::new();
            data.insert("text".to_string(), Value::String("a".into()));
            data.insert("num".to_string(), Value::Int(n));
            data.insert("flag".to_string(), Value::Bool(false));
            driver.create("bar", data).await.unwrap();
        }

        let affected = driver
            .set(
                &Selection::new("bar").filter(QueryExpr::all()),
                &[("num".to_string(), EvalExpr::Add(vec![EvalExpr::path("num"), EvalExpr::lit(1i64)]))],
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = driver.get(&Selection::new("bar").filter(QueryExpr::all())).await.unwrap();
        let mut nums: Vec<i64> = rows.iter().map(|r| r.get("num").unwrap().as_int().unwrap()).collect();
        nums.sort();
        assert_eq!(nums, vec![2, 11]);
    }

    #[tokio::test]
    async fn remove_deletes_matching_rows() {
        let driver = started_driver().await;
        let mut data = HashMap::new();
        data.insert("text".to_string(), Value::String("a".into()));
        data.insert("num".to_string(), Value::Int(1));
        data.insert("flag".to_string(), Value::Bool(false));
        driver.create("bar", data).await.unwrap();

        let affected = driver.remove(&Selection::new("bar").filter(QueryExpr::all())).await.unwrap();
        assert_eq!(affected, 1);
        let rows = driver.get(&Selection::new("bar").filter(QueryExpr::all())).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let driver = started_driver().await;
        let mut item = HashMap::new();
        item.insert("num".to_string(), Value::Int(42));
        item.insert("text".to_string(), Value::String("x".into()));
        item.insert("flag".to_string(), Value::Bool(false));
        driver.upsert("bar", &["num".to_string()], vec![item.clone()]).await.unwrap();

        item.insert("text".to_string(), Value::String("y".into()));
        driver.upsert("bar", &["num".to_string()], vec![item]).await.unwrap();

        let rows = driver.get(&Selection::new("bar").filter(QueryExpr::eq("num", 42i64))).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("text"), Some(&Value::String("y".into())));
    }

    #[tokio::test]
    async fn eval_sum_aggregates_matching_rows() {
        let driver = started_driver().await;
        for n in [1i64, 2, 3] {
            let mut data = HashMap::new();
            data.insert("text".to_string(), Value::String("x".into()));
            data.insert("num".to_string(), Value::Int(n));
            data.insert("flag".to_string(), Value::Bool(false));
            driver.create("bar", data).await.unwrap();
        }
        let total = driver.eval(&Selection::new("bar").filter(QueryExpr::all()), &EvalExpr::Sum(Box::new(EvalExpr::path("num")))).await.unwrap();
        assert_eq!(total, Value::Int(6));
    }
}
