//! In-memory [`EvalExpr`] interpreter, evaluating an update expression
//! against one already-fetched logical row rather than compiling it to SQL.
//!
//! This backs the embedded (SQLite) `set` strategy: "fetch matching rows,
//! compute per-row new values ... and emit one UPDATE per row", as opposed
//! to the SQL-native (MySQL) strategy of compiling each update value to a
//! single SQL fragment (see [`crate::builder::QueryBuilder::compile_set`]).
//! Aggregates have no meaning against a single row and are rejected.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::query_expr::EvalExpr;
use crate::value::Value;

/// Evaluate `expr` against the current logical values of `row`.
pub(crate) fn eval_against_row(expr: &EvalExpr, row: &HashMap<String, Value>) -> Result<Value> {
    Ok(match expr {
        EvalExpr::Literal(v) => v.clone(),
        EvalExpr::Path(p) => resolve_path(row, p),

        EvalExpr::Add(items) => fold_numeric(items, row, 0.0, |acc, v| acc + v)?,
        EvalExpr::Multiply(items) => fold_numeric(items, row, 1.0, |acc, v| acc * v)?,
        EvalExpr::Subtract(a, b) => numeric_binop(a, b, row, |x, y| x - y)?,
        EvalExpr::Divide(a, b) => numeric_binop(a, b, row, |x, y| x / y)?,

        EvalExpr::Eq(a, b) => Value::Bool(eval_against_row(a, row)? == eval_against_row(b, row)?),
        EvalExpr::Ne(a, b) => Value::Bool(eval_against_row(a, row)? != eval_against_row(b, row)?),
        EvalExpr::Gt(a, b) => Value::Bool(compare(a, b, row)? == std::cmp::Ordering::Greater),
        EvalExpr::Gte(a, b) => Value::Bool(compare(a, b, row)? != std::cmp::Ordering::Less),
        EvalExpr::Lt(a, b) => Value::Bool(compare(a, b, row)? == std::cmp::Ordering::Less),
        EvalExpr::Lte(a, b) => Value::Bool(compare(a, b, row)? != std::cmp::Ordering::Greater),

        EvalExpr::And(items) => {
            let mut result = true;
            for item in items {
                result &= truthy(&eval_against_row(item, row)?);
            }
            Value::Bool(result)
        }
        EvalExpr::Or(items) => {
            let mut result = false;
            for item in items {
                result |= truthy(&eval_against_row(item, row)?);
            }
            Value::Bool(result)
        }
        EvalExpr::Not(inner) => Value::Bool(!truthy(&eval_against_row(inner, row)?)),

        EvalExpr::Concat(items) => {
            let mut out = String::new();
            for item in items {
                out.push_str(&display_value(&eval_against_row(item, row)?));
            }
            Value::String(out)
        }

        EvalExpr::If { cond, then, else_ } => {
            if truthy(&eval_against_row(cond, row)?) {
                eval_against_row(then, row)?
            } else {
                eval_against_row(else_, row)?
            }
        }
        EvalExpr::IfNull(a, b) => {
            let v = eval_against_row(a, row)?;
            if v.is_null() {
                eval_against_row(b, row)?
            } else {
                v
            }
        }

        EvalExpr::Length(inner) => match eval_against_row(inner, row)? {
            Value::List(items) => Value::Int(items.len() as i64),
            Value::Json(serde_json::Value::Array(items)) => Value::Int(items.len() as i64),
            Value::String(s) => Value::Int(s.split(',').count() as i64),
            Value::Null => Value::Null,
            other => return Err(Error::query_malformed(format!("$length on non-list/json value `{}`", other.type_name()))),
        },

        EvalExpr::Sum(_) | EvalExpr::Avg(_) | EvalExpr::Min(_) | EvalExpr::Max(_) | EvalExpr::Count(_) => {
            return Err(Error::query_malformed(
                "aggregate expressions are not valid in a per-row `set` update value".to_string(),
            ));
        }
    })
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        _ => true,
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.as_str().map(str::to_string).unwrap_or_else(|| format!("{other:?}")),
    }
}

fn fold_numeric(
    items: &[EvalExpr],
    row: &HashMap<String, Value>,
    identity: f64,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    let mut acc = identity;
    let mut all_int = true;
    for item in items {
        let v = eval_against_row(item, row)?;
        if !matches!(v, Value::Int(_)) {
            all_int = false;
        }
        acc = op(acc, numeric(&v)?);
    }
    Ok(if all_int { Value::Int(acc as i64) } else { Value::Float(acc) })
}

fn numeric_binop(a: &EvalExpr, b: &EvalExpr, row: &HashMap<String, Value>, op: impl Fn(f64, f64) -> f64) -> Result<Value> {
    let a = eval_against_row(a, row)?;
    let b = eval_against_row(b, row)?;
    let both_int = matches!(a, Value::Int(_)) && matches!(b, Value::Int(_));
    let result = op(numeric(&a)?, numeric(&b)?);
    Ok(if both_int { Value::Int(result as i64) } else { Value::Float(result) })
}

fn numeric(v: &Value) -> Result<f64> {
    v.as_float().ok_or_else(|| Error::query_malformed(format!("expected a numeric value, got {}", v.type_name())))
}

fn compare(a: &EvalExpr, b: &EvalExpr, row: &HashMap<String, Value>) -> Result<std::cmp::Ordering> {
    let a = eval_against_row(a, row)?;
    let b = eval_against_row(b, row)?;
    a.partial_cmp_query(&b)
        .ok_or_else(|| Error::query_malformed(format!("cannot compare {} and {}", a.type_name(), b.type_name())))
}

/// Resolve a (possibly dotted) path against the row's logical values. A
/// dotted path reaches into a `Json` field via `serde_json::Value::pointer`.
fn resolve_path(row: &HashMap<String, Value>, path: &str) -> Value {
    let segments: Vec<&str> = path.split('.').collect();
    let Some(root) = row.get(segments[0]) else {
        return Value::Null;
    };
    if segments.len() == 1 {
        return root.clone();
    }
    match root {
        Value::Json(j) => {
            let pointer = format!("/{}", segments[1..].join("/"));
            j.pointer(&pointer)
                .and_then(|v| serde_json::from_value::<Value>(v.clone()).ok())
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

/// Apply one resolved update value to `row` at `path`, merging into a
/// `Json` field's nested key for a dotted path rather than replacing the
/// whole column.
pub(crate) fn apply_to_row(row: &mut HashMap<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() == 1 {
        row.insert(segments[0].to_string(), value);
        return;
    }
    let root = segments[0].to_string();
    let mut current = match row.get(&root) {
        Some(Value::Json(j)) => j.clone(),
        _ => serde_json::json!({}),
    };
    set_json_pointer(&mut current, &segments[1..], value);
    row.insert(root, Value::Json(current));
}

fn set_json_pointer(target: &mut serde_json::Value, segments: &[&str], value: Value) {
    if !target.is_object() {
        *target = serde_json::json!({});
    }
    let obj = target.as_object_mut().expect("just normalized to an object");
    if segments.len() == 1 {
        obj.insert(segments[0].to_string(), value_to_json(&value));
        return;
    }
    let child = obj.entry(segments[0].to_string()).or_insert_with(|| serde_json::json!({}));
    set_json_pointer(child, &segments[1..], value);
}

fn value_to_json(v: &Value) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> HashMap<String, Value> {
        let mut r = HashMap::new();
        r.insert("num".to_string(), Value::Int(10));
        r.insert("text".to_string(), Value::String("hi".to_string()));
        r.insert("meta".to_string(), Value::Json(serde_json::json!({"a": 1})));
        r
    }

    #[test]
    fn add_against_path_and_literal() {
        let r = row();
        let v = eval_against_row(&EvalExpr::Add(vec![EvalExpr::path("num"), EvalExpr::lit(5i64)]), &r).unwrap();
        assert_eq!(v, Value::Int(15));
    }

    #[test]
    fn concat_stringifies_each_operand() {
        let r = row();
        let v = eval_against_row(&EvalExpr::Concat(vec![EvalExpr::path("text"), EvalExpr::lit("!")]), &r).unwrap();
        assert_eq!(v, Value::String("hi!".to_string()));
    }

    #[test]
    fn json_dotted_path_reads_nested_key() {
        let r = row();
        let v = eval_against_row(&EvalExpr::path("meta.a"), &r).unwrap();
        assert_eq!(v, Value::Int(1));
    }

    #[test]
    fn apply_to_row_merges_json_sibling_keys() {
        let mut r = row();
        apply_to_row(&mut r, "meta.b", Value::Int(2));
        assert_eq!(r.get("meta"), Some(&Value::Json(serde_json::json!({"a": 1, "b": 2}))));
    }

    #[test]
    fn aggregate_in_set_value_is_rejected() {
        let r = row();
        assert!(eval_against_row(&EvalExpr::Sum(Box::new(EvalExpr::path("num"))), &r).is_err());
    }
}
