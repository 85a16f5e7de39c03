//! Shared helper functions for SQL dialect implementations.
//!
//! Reusable building blocks that the two dialects compose to implement
//! `SqlDialect` with minimal duplication.

use crate::field::FieldType;

/// Quote identifier with double quotes. Used by: SQLite.
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks. Used by: MySQL.
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Format boolean as numeric 1/0. Both SQLite (no boolean affinity) and
/// MySQL (`TINYINT(1)`) store booleans this way.
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Map a semantic [`FieldType`] to a SQLite column type. SQLite's type
/// affinity system means most of these collapse to a handful of storage
/// classes; the declared type name is kept descriptive anyway since it
/// documents intent and survives into `PRAGMA table_info`.
pub fn emit_field_type_sqlite(
    ty: FieldType,
    length: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
) -> String {
    match ty {
        FieldType::Primary => "INTEGER".into(),
        FieldType::Boolean => "BOOLEAN".into(),
        FieldType::Integer => "INTEGER".into(),
        FieldType::Unsigned => "INTEGER".into(),
        FieldType::Float => "REAL".into(),
        FieldType::Double => "REAL".into(),
        FieldType::Decimal => {
            let (p, s) = (precision.unwrap_or(18), scale.unwrap_or(2));
            format!("DECIMAL({}, {})", p, s)
        }
        FieldType::Char => format!("CHARACTER({})", length.unwrap_or(1)),
        FieldType::String => match length {
            Some(n) => format!("VARCHAR({})", n),
            None => "TEXT".into(),
        },
        FieldType::Text | FieldType::List | FieldType::Json => "TEXT".into(),
        FieldType::Date => "DATE".into(),
        FieldType::Time => "TIME".into(),
        FieldType::Timestamp => "TIMESTAMP".into(),
    }
}

/// Map a semantic [`FieldType`] to a MySQL column type.
pub fn emit_field_type_mysql(
    ty: FieldType,
    length: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
) -> String {
    match ty {
        FieldType::Primary => "BIGINT".into(),
        FieldType::Boolean => "TINYINT(1)".into(),
        FieldType::Integer => "BIGINT".into(),
        FieldType::Unsigned => "BIGINT UNSIGNED".into(),
        FieldType::Float => "FLOAT".into(),
        FieldType::Double => "DOUBLE".into(),
        FieldType::Decimal => {
            let (p, s) = (precision.unwrap_or(18), scale.unwrap_or(2));
            format!("DECIMAL({}, {})", p, s)
        }
        FieldType::Char => format!("CHAR({})", length.unwrap_or(1)),
        FieldType::String => format!("VARCHAR({})", length.unwrap_or(255)),
        FieldType::Text | FieldType::List | FieldType::Json => "TEXT".into(),
        FieldType::Date => "DATE".into(),
        FieldType::Time => "TIME".into(),
        FieldType::Timestamp => "DATETIME".into(),
    }
}

/// Function-name remapping shared by both dialects, covering the handful
/// of scalar functions the query compiler emits in `EvalExpr` where the two
/// backends disagree on spelling.
pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "IFNULL" => None, // native
        "NVL" => Some("IFNULL"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_double("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_backtick("a`b"), "`a``b`");
    }

    #[test]
    fn field_type_mapping_differs_by_dialect() {
        assert_eq!(
            emit_field_type_sqlite(FieldType::String, Some(10), None, None),
            "VARCHAR(10)"
        );
        assert_eq!(
            emit_field_type_mysql(FieldType::Unsigned, None, None, None),
            "BIGINT UNSIGNED"
        );
        assert_eq!(
            emit_field_type_mysql(FieldType::Timestamp, None, None, None),
            "DATETIME"
        );
    }
}
