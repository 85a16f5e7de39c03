//! The caller-facing façade (§6): `extend`, `get`, `create`, `set`,
//! `upsert`, `remove`, `eval`, `drop`, `stats`. A [`Database`] owns one
//! [`Driver`] and the [`ModelRegistry`] of tables it has declared via
//! `extend` — everything downstream ([`crate::builder`],
//! [`crate::schema`], [`crate::caster`]) is driven off that registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{ConnectionSettings, SettingsError};
use crate::driver::{Driver, MySqlDriver, Selection, SqliteDriver, Stats};
use crate::error::{Error, Result};
use crate::model::{Model, ModelRegistry};
use crate::query_expr::{EvalExpr, QueryExpr};
use crate::value::Value;

/// A connected database: one driver, one registry of declared models.
/// Cheap to clone — internally `Arc`s the driver and registry, so a clone
/// shares the same live connection/pool.
#[derive(Clone)]
pub struct Database {
    driver: Arc<dyn Driver>,
    registry: Arc<RwLock<ModelRegistry>>,
}

impl Database {
    /// Connect using a resolved [`ConnectionSettings`] entry, dispatching to
    /// the SQLite or MySQL driver per its tag, then calling `start()`.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let registry = Arc::new(RwLock::new(ModelRegistry::new()));
        let driver: Arc<dyn Driver> = match settings {
            ConnectionSettings::Sqlite { .. } => {
                let config = settings.resolved_sqlite().map_err(settings_error)?;
                Arc::new(SqliteDriver::new(config, registry.clone()))
            }
            ConnectionSettings::Mysql { .. } => {
                let config = settings.resolved_mysql().map_err(settings_error)?;
                let pool = settings.pool().cloned().unwrap_or_default();
                Arc::new(MySqlDriver::new(config, pool, registry.clone()))
            }
        };
        driver.start().await?;
        Ok(Self { driver, registry })
    }

    /// Wrap an already-constructed driver, e.g. for tests that want direct
    /// control over a [`SqliteDriver`] or [`MySqlDriver`] instance.
    pub fn with_driver(driver: Arc<dyn Driver>, registry: Arc<RwLock<ModelRegistry>>) -> Self {
        Self { driver, registry }
    }

    pub async fn stop(&self) -> Result<()> {
        self.driver.stop().await
    }

    /// Declare (or redeclare) a table's model and synchronize its schema
    /// (§4.5). The registry is updated before `prepare` runs, so the
    /// synchronizer always sees the model being declared.
    pub async fn extend(&self, model: Model) -> Result<()> {
        let name = model.name.clone();
        self.registry.write().await.register(model);
        self.driver.prepare(&name).await
    }

    /// Drop a declared model from the registry without touching the live
    /// table. Pair with [`Database::drop_table`] to remove both.
    pub async fn forget(&self, table: &str) {
        self.registry.write().await.remove(table);
    }

    pub async fn get(&self, table: impl Into<String>, query: QueryExpr) -> Result<Vec<HashMap<String, Value>>> {
        self.driver.get(&Selection::new(table).filter(query)).await
    }

    /// `get` with a modifier: projection, sort, limit/offset applied via the
    /// full [`Selection`] builder.
    pub async fn get_with(&self, sel: Selection) -> Result<Vec<HashMap<String, Value>>> {
        self.driver.get(&sel).await
    }

    pub async fn create(&self, table: &str, data: HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        self.driver.create(table, data).await
    }

    pub async fn set(
        &self,
        table: impl Into<String>,
        query: QueryExpr,
        update: Vec<(String, EvalExpr)>,
    ) -> Result<u64> {
        self.driver.set(&Selection::new(table).filter(query), &update).await
    }

    /// For each row in `rows`, update the row uniquely identified by `keys`
    /// if one exists, else insert it with model defaults applied (§4.4).
    pub async fn upsert(&self, table: &str, rows: Vec<HashMap<String, Value>>, keys: &[String]) -> Result<()> {
        self.driver.upsert(table, keys, rows).await
    }

    pub async fn remove(&self, table: impl Into<String>, query: QueryExpr) -> Result<u64> {
        self.driver.remove(&Selection::new(table).filter(query)).await
    }

    pub async fn eval(&self, table: impl Into<String>, query: QueryExpr, expr: EvalExpr) -> Result<Value> {
        self.driver.eval(&Selection::new(table).filter(query), &expr).await
    }

    pub async fn drop_table(&self, table: Option<&str>) -> Result<()> {
        self.driver.drop_table(table).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.driver.stats().await
    }
}

fn settings_error(e: SettingsError) -> Error {
    Error::storage(e, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteConfig;
    use crate::field::{Field, FieldType};

    async fn memory_db() -> Database {
        let registry = Arc::new(RwLock::new(ModelRegistry::new()));
        let driver = SqliteDriver::new(SqliteConfig::memory(), registry.clone());
        driver.start().await.unwrap();
        Database::with_driver(Arc::new(driver), registry)
    }

    fn bar_model() -> Model {
        Model::new(
            "bar",
            vec![
                Field::new("id", FieldType::Primary),
                Field::new("text", FieldType::String),
                Field::new("num", FieldType::Integer),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn extend_then_create_and_get_round_trips() {
        let db = memory_db().await;
        db.extend(bar_model()).await.unwrap();

        let mut data = HashMap::new();
        data.insert("text".to_string(), Value::String("hi".into()));
        data.insert("num".to_string(), Value::Int(1));
        let created = db.create("bar", data).await.unwrap();
        assert!(created.contains_key("id"));

        let rows = db.get("bar", QueryExpr::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn extend_is_idempotent_across_calls() {
        let db = memory_db().await;
        db.extend(bar_model()).await.unwrap();
        db.extend(bar_model()).await.unwrap();
    }

    #[tokio::test]
    async fn remove_and_stats_reflect_row_count() {
        let db = memory_db().await;
        db.extend(bar_model()).await.unwrap();

        let mut data = HashMap::new();
        data.insert("text".to_string(), Value::String("a".into()));
        data.insert("num".to_string(), Value::Int(1));
        db.create("bar", data).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.tables.get("bar").unwrap().count, 1);

        let removed = db.remove("bar", QueryExpr::all()).await.unwrap();
        assert_eq!(removed, 1);
    }
}
