//! Runtime value representation.
//!
//! `Value` is the dynamically-typed payload that flows between callers, the
//! [`caster`](crate::caster), and the drivers. It is deliberately smaller
//! than [`FieldType`](crate::field::FieldType) — json and list fields cast
//! down to `Value::Json`/`Value::List` at the boundary, not to dedicated
//! variants of their own.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dynamically-typed runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Type tag used in diagnostics and by query compilation to decide
    /// which SQL literal form to emit.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Json(_) => "json",
        }
    }

    /// Three-way comparison following the query algebra's cross-type
    /// ordering: `Null < Bool < numeric < String < Date/Time/Timestamp <
    /// List < Json`. Numeric variants compare by value across Int/Float.
    /// Returns `None` for Json-vs-Json, which the algebra treats as
    /// unorderable outside of equality.
    pub fn partial_cmp_query(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (String(a), String(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Time(a), Time(b)) => a.partial_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
            (List(a), List(b)) => a.len().partial_cmp(&b.len()),
            _ => rank(self).partial_cmp(&rank(other)),
        }
    }
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => 4,
        Value::List(_) => 5,
        Value::Json(_) => 6,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cross_type_ordering() {
        assert_eq!(
            Value::Int(3).partial_cmp_query(&Value::Float(3.5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn rank_based_ordering_across_kinds() {
        assert_eq!(
            Value::Null.partial_cmp_query(&Value::Bool(false)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("x".into()).partial_cmp_query(&Value::Int(1)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn coercions() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(Some(5i64)).as_int(), Some(5));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
