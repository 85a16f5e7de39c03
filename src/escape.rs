//! Dialect-aware escaping primitives.
//!
//! The rest of the compiler works over [`crate::sql::expr::Expr`], but two
//! conversions can't be expressed as a single `From` impl because they
//! depend on which engine is on the other end: date-like values serialize
//! to epoch-millisecond integers against SQLite (no native temporal type)
//! and to `yyyy-MM-dd HH:mm:ss` text against MySQL's `DATETIME`. This module
//! is the single place that decision is made.

use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{lit_bool, lit_int, lit_null, lit_str, Expr};
use crate::value::Value;

/// Convert a runtime value into its dialect-specific SQL literal expression.
///
/// Scalars (bool/int/float/string) are dialect-independent except for
/// booleans, which SQLite and MySQL both store numerically but which this
/// function still routes through `SqlDialect::format_bool` so a future
/// dialect that prefers `TRUE`/`FALSE` literals only has to override one
/// method. Lists and json values are dumped to JSON text — a [`Value::List`]
/// or [`Value::Json`] reaching this function means the caster already chose
/// text storage for it.
pub fn escape_value(dialect: Dialect, v: &Value) -> Expr {
    match v {
        Value::Null => lit_null(),
        Value::Bool(b) => lit_bool(dialect.format_bool(*b) == "1"),
        Value::Int(i) => lit_int(*i),
        Value::Float(f) => Expr::Literal(crate::sql::expr::Literal::Float(*f)),
        Value::String(s) => lit_str(s.clone()),
        Value::Date(d) => escape_date_like(dialect, &d.and_hms_opt(0, 0, 0).expect("midnight is a valid time")),
        Value::Time(t) => escape_time(dialect, t),
        Value::Timestamp(ts) => escape_date_like(dialect, ts),
        Value::List(_) | Value::Json(_) => lit_str(serde_json::to_string(v).unwrap_or_default()),
    }
}

/// SQLite has no temporal storage class: dates and timestamps round-trip as
/// epoch-millisecond integers. MySQL's `DATETIME`/`DATE` columns expect
/// `yyyy-MM-dd HH:mm:ss` text instead.
fn escape_date_like(dialect: Dialect, ts: &chrono::NaiveDateTime) -> Expr {
    match dialect {
        Dialect::Sqlite => lit_int(ts.and_utc().timestamp_millis()),
        Dialect::MySql => lit_str(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

fn escape_time(dialect: Dialect, t: &chrono::NaiveTime) -> Expr {
    match dialect {
        Dialect::Sqlite => {
            let midnight = chrono::NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid");
            lit_int((*t - midnight).num_milliseconds())
        }
        Dialect::MySql => lit_str(t.format("%H:%M:%S").to_string()),
    }
}

/// Quote a possibly-qualified identifier: `table.column` becomes
/// `` `table`.`column` `` (MySQL) or `"table"."column"` (SQLite), each part
/// quoted independently.
pub fn escape_id(dialect: Dialect, name: &str) -> String {
    name.split('.')
        .map(|part| dialect.quote_identifier(part))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::Literal;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn null_and_scalars_are_dialect_independent() {
        assert_eq!(escape_value(Dialect::Sqlite, &Value::Null), lit_null());
        assert_eq!(escape_value(Dialect::MySql, &Value::Int(7)), lit_int(7));
    }

    #[test]
    fn booleans_format_numerically_on_both_dialects() {
        assert_eq!(escape_value(Dialect::Sqlite, &Value::Bool(true)), lit_bool(true));
        assert_eq!(escape_value(Dialect::MySql, &Value::Bool(false)), lit_bool(false));
    }

    #[test]
    fn dates_diverge_by_dialect() {
        let d = Value::Date(NaiveDate::from_ymd_opt(1970, 8, 17).unwrap());
        let sqlite = escape_value(Dialect::Sqlite, &d);
        assert!(matches!(sqlite, Expr::Literal(Literal::Int(_))));

        let mysql = escape_value(Dialect::MySql, &d);
        assert_eq!(mysql, lit_str("1970-08-17 00:00:00"));
    }

    #[test]
    fn time_diverges_by_dialect() {
        let t = Value::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(
            escape_value(Dialect::MySql, &t),
            lit_str("12:00:00")
        );
        assert_eq!(
            escape_value(Dialect::Sqlite, &t),
            lit_int(12 * 3600 * 1000)
        );
    }

    #[test]
    fn lists_serialize_as_json_text() {
        let l = Value::List(vec![Value::String("1".into()), Value::String("4".into())]);
        assert_eq!(escape_value(Dialect::Sqlite, &l), lit_str("[\"1\",\"4\"]"));
    }

    #[test]
    fn qualified_identifier_quotes_each_part() {
        assert_eq!(escape_id(Dialect::Sqlite, "bar.id"), "\"bar\".\"id\"");
        assert_eq!(escape_id(Dialect::MySql, "bar.id"), "`bar`.`id`");
    }
}
