//! End-to-end scenarios against an in-memory SQLite-backed `Database`.
//!
//! Mirrors the seeded `bar` table and numbered scenarios used to validate
//! the query compiler, caster, and schema synchronizer together rather than
//! in isolation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;

use tessera::config::SqliteConfig;
use tessera::driver::SqliteDriver;
use tessera::field::{Field, FieldType};
use tessera::model::{Model, ModelRegistry};
use tessera::query_expr::{EvalExpr, FieldQuery, QueryExpr};
use tessera::value::Value;
use tessera::Database;

fn bar_model() -> Model {
    Model::new(
        "bar",
        vec![
            Field::new("id", FieldType::Primary),
            Field::new("text", FieldType::String),
            Field::new("num", FieldType::Integer),
            Field::new("bool", FieldType::Boolean),
            Field::new("list", FieldType::List),
            Field::new("timestamp", FieldType::Timestamp),
            Field::new("date", FieldType::Date),
            Field::new("time", FieldType::Time),
        ],
    )
    .unwrap()
}

async fn memory_db() -> Database {
    let registry = Arc::new(RwLock::new(ModelRegistry::new()));
    let driver = SqliteDriver::new(SqliteConfig::memory(), registry.clone());
    driver.start().await.unwrap();
    Database::with_driver(Arc::new(driver), registry)
}

fn seed_date() -> Value {
    Value::Date(NaiveDate::from_ymd_opt(1970, 8, 17).unwrap())
}

fn seed_time() -> Value {
    Value::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
}

async fn seed(db: &Database) {
    db.extend(bar_model()).await.unwrap();

    let mut row1 = HashMap::new();
    row1.insert("bool".into(), Value::Bool(true));
    db.create("bar", row1).await.unwrap();

    let mut row2 = HashMap::new();
    row2.insert("text".into(), Value::String("pku".into()));
    db.create("bar", row2).await.unwrap();

    let mut row3 = HashMap::new();
    row3.insert("num".into(), Value::Int(1989));
    db.create("bar", row3).await.unwrap();

    let mut row4 = HashMap::new();
    row4.insert(
        "list".into(),
        Value::List(vec![Value::String("1".into()), Value::String("1".into()), Value::String("4".into())]),
    );
    db.create("bar", row4).await.unwrap();

    let mut row5 = HashMap::new();
    row5.insert("timestamp".into(), seed_date());
    db.create("bar", row5).await.unwrap();

    let mut row6 = HashMap::new();
    row6.insert("date".into(), seed_date());
    db.create("bar", row6).await.unwrap();

    let mut row7 = HashMap::new();
    row7.insert("time".into(), seed_time());
    db.create("bar", row7).await.unwrap();
}

fn row_id(row: &HashMap<String, Value>) -> i64 {
    row.get("id").and_then(Value::as_int).unwrap()
}

#[tokio::test]
async fn scenario_1_set_with_or_touches_only_matching_rows() {
    let db = memory_db().await;
    seed(&db).await;

    let filter = QueryExpr::or(vec![
        QueryExpr::field("id", vec![FieldQuery::In(vec![Value::Int(1), Value::Int(2)])]),
        QueryExpr::eq("timestamp", seed_date()),
    ]);
    let touched = db.set("bar", filter, vec![("text".into(), EvalExpr::lit("thu"))]).await.unwrap();
    assert_eq!(touched, 3);

    let rows = db
        .get("bar", QueryExpr::field("id", vec![FieldQuery::In(vec![Value::Int(1), Value::Int(2), Value::Int(5)])]))
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.get("text"), Some(&Value::String("thu".into())));
    }

    let row3 = db.get("bar", QueryExpr::eq("id", 3i64)).await.unwrap();
    assert_eq!(row3[0].get("text"), Some(&Value::Null));
}

#[tokio::test]
async fn scenario_2_set_null_only_mutates_the_exists_match() {
    let db = memory_db().await;
    seed(&db).await;

    let touched = db
        .set("bar", QueryExpr::field("timestamp", vec![FieldQuery::Exists(true)]), vec![("text".into(), EvalExpr::lit(Value::Null))])
        .await
        .unwrap();
    assert_eq!(touched, 1);

    let row5 = db.get("bar", QueryExpr::eq("id", 5i64)).await.unwrap();
    assert_eq!(row5[0].get("text"), Some(&Value::Null));
}

#[tokio::test]
async fn scenario_3_eval_sum_over_seed() {
    let db = memory_db().await;
    seed(&db).await;

    let total = db.eval("bar", QueryExpr::all(), EvalExpr::Sum(Box::new(EvalExpr::path("num")))).await.unwrap();
    assert_eq!(total.as_int(), Some(1989));
}

#[tokio::test]
async fn scenario_4_eval_count_distinct_non_null() {
    let db = memory_db().await;
    seed(&db).await;

    let count = db.eval("bar", QueryExpr::all(), EvalExpr::Count(Box::new(EvalExpr::path("bool")))).await.unwrap();
    assert_eq!(count.as_int(), Some(1));
}

#[tokio::test]
async fn scenario_5_upsert_updates_existing_and_inserts_new() {
    let db = memory_db().await;
    seed(&db).await;

    let mut update_row = HashMap::new();
    update_row.insert("id".into(), Value::Int(2));
    update_row.insert("num".into(), Value::Int(1911));

    let mut new_row = HashMap::new();
    new_row.insert("id".into(), Value::Int(99));
    new_row.insert("text".into(), Value::String("new".into()));

    db.upsert("bar", vec![update_row, new_row], &["id".to_string()]).await.unwrap();

    let row2 = db.get("bar", QueryExpr::eq("id", 2i64)).await.unwrap();
    assert_eq!(row2[0].get("num"), Some(&Value::Int(1911)));
    assert_eq!(row2[0].get("text"), Some(&Value::String("pku".into())));

    let row99 = db.get("bar", QueryExpr::eq("id", 99i64)).await.unwrap();
    assert_eq!(row99.len(), 1);
    assert_eq!(row99[0].get("text"), Some(&Value::String("new".into())));

    let rows = db.get("bar", QueryExpr::all()).await.unwrap();
    assert_eq!(rows.len(), 8);
}

#[tokio::test]
async fn scenario_6_remove_deletes_only_matching_rows() {
    let db = memory_db().await;
    seed(&db).await;

    let removed = db.remove("bar", QueryExpr::field("id", vec![FieldQuery::Gt(Value::Int(5))])).await.unwrap();
    assert_eq!(removed, 2);

    let remaining = db.get("bar", QueryExpr::all()).await.unwrap();
    assert_eq!(remaining.len(), 5);
    let ids: Vec<i64> = remaining.iter().map(row_id).collect();
    assert!(!ids.contains(&6));
    assert!(!ids.contains(&7));
}

#[tokio::test]
async fn scenario_8_empty_in_short_circuits_remove() {
    let db = memory_db().await;
    seed(&db).await;

    let removed = db.remove("bar", QueryExpr::field("id", vec![FieldQuery::In(Vec::new())])).await.unwrap();
    assert_eq!(removed, 0);

    let remaining = db.get("bar", QueryExpr::all()).await.unwrap();
    assert_eq!(remaining.len(), 7);
}

#[tokio::test]
async fn round_trip_list_field_preserves_order_and_duplicates() {
    let db = memory_db().await;
    seed(&db).await;

    let row4 = db.get("bar", QueryExpr::eq("id", 4i64)).await.unwrap();
    assert_eq!(
        row4[0].get("list"),
        Some(&Value::List(vec![Value::String("1".into()), Value::String("1".into()), Value::String("4".into())]))
    );
}

#[tokio::test]
async fn round_trip_date_and_timestamp_fields() {
    let db = memory_db().await;
    seed(&db).await;

    let row6 = db.get("bar", QueryExpr::eq("id", 6i64)).await.unwrap();
    assert_eq!(row6[0].get("date"), Some(&seed_date()));

    // Row 5 seeds a Date value into the `timestamp` column; reading it back
    // through a Timestamp-typed field yields that date at midnight, not the
    // bare Date variant — the declared field type governs the loaded shape.
    let row5 = db.get("bar", QueryExpr::eq("id", 5i64)).await.unwrap();
    assert_eq!(
        row5[0].get("timestamp"),
        Some(&Value::Timestamp(
            chrono::NaiveDate::from_ymd_opt(1970, 8, 17).unwrap().and_hms_opt(0, 0, 0).unwrap()
        ))
    );

    let row7 = db.get("bar", QueryExpr::eq("id", 7i64)).await.unwrap();
    assert_eq!(row7[0].get("time"), Some(&seed_time()));
}
