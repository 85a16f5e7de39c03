//! SQL dialect definitions and formatting rules.
//!
//! A trait-based abstraction over the two backends this crate drives:
//!
//! - Identifier quoting: `"` (SQLite) vs `` ` `` (MySQL)
//! - Boolean literals: `1`/`0` (SQLite's affinity-free storage) vs MySQL's
//!   `TINYINT(1)` convention
//! - Upsert: `INSERT ... ON CONFLICT` vs `INSERT ... ON DUPLICATE KEY UPDATE`
//! - `set` strategy: row-function updates evaluated client-side per row
//!   (SQLite only — see [`crate::row_eval`] and `crate::driver::sqlite`)
//!   vs. a single SQL-compiled `UPDATE` (MySQL — see
//!   [`crate::builder::QueryBuilder::compile_set`])
//!
//! # Usage
//!
//! ```ignore
//! use tessera::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::MySql;
//! let quoted = dialect.quote_identifier("user"); // `user`
//! ```

pub mod helpers;
mod mysql;
mod sqlite;

pub use mysql::MySql;
pub use sqlite::Sqlite;

use super::token::{Token, TokenStream};
use crate::field::FieldType;

/// SQL dialect trait — defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal. Both dialects use single quotes with `''`
    /// escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Emit `LIMIT n OFFSET m` or equivalent pagination clause. Both
    /// dialects share the same syntax.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let mut ts = TokenStream::new();
        if let Some(lim) = limit {
            ts.push(Token::Limit).space().push(Token::LitInt(lim as i64));
        }
        if let Some(off) = offset {
            if limit.is_some() {
                ts.space();
            }
            ts.push(Token::Offset)
                .space()
                .push(Token::LitInt(off as i64));
        }
        ts
    }

    /// String concatenation operator, when supported directly.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the `||` concat operator directly.
    /// MySQL uses `||` as logical OR by default; the query compiler falls
    /// back to `CONCAT(...)` there.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Modulo operator or equivalent.
    fn modulo_operator(&self) -> &'static str {
        "%"
    }

    /// Remap a function name for this dialect. Returns `Some(new_name)` if
    /// the function should be remapped, `None` to keep the original. Input
    /// is matched case-insensitively.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }

    /// Emit the column type for a declared field.
    fn emit_field_type(
        &self,
        ty: FieldType,
        length: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
    ) -> String;

    /// Emit the autoincrement-primary-key column fragment, e.g.
    /// `INTEGER PRIMARY KEY AUTOINCREMENT` (SQLite) or
    /// `BIGINT PRIMARY KEY AUTO_INCREMENT` (MySQL).
    fn emit_primary_key_column(&self) -> TokenStream;

    /// Whether `CREATE TABLE IF NOT EXISTS` is supported. Both dialects
    /// support this.
    fn supports_if_not_exists(&self) -> bool {
        true
    }

    /// Render the upsert tail of an INSERT statement: `ON CONFLICT (...) DO
    /// UPDATE SET ...` (SQLite) or `ON DUPLICATE KEY UPDATE ...` (MySQL).
    /// `conflict_columns` names the unique/primary index to upsert against;
    /// SQLite requires it, MySQL ignores it.
    fn emit_upsert(&self, conflict_columns: &[String], update_columns: &[String]) -> TokenStream;

    /// The function call used to read back an autoincrement id after an
    /// insert: `last_insert_rowid()` (SQLite) or `LAST_INSERT_ID()` (MySQL).
    fn last_insert_id_expr(&self) -> &'static str;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::MySql => &MySql,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn modulo_operator(&self) -> &'static str {
        self.dialect().modulo_operator()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }

    fn emit_field_type(
        &self,
        ty: FieldType,
        length: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
    ) -> String {
        self.dialect().emit_field_type(ty, length, precision, scale)
    }

    fn emit_primary_key_column(&self) -> TokenStream {
        self.dialect().emit_primary_key_column()
    }

    fn supports_if_not_exists(&self) -> bool {
        self.dialect().supports_if_not_exists()
    }

    fn emit_upsert(&self, conflict_columns: &[String], update_columns: &[String]) -> TokenStream {
        self.dialect().emit_upsert(conflict_columns, update_columns)
    }

    fn last_insert_id_expr(&self) -> &'static str {
        self.dialect().last_insert_id_expr()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_display() {
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
        assert_eq!(Dialect::MySql.to_string(), "mysql");
    }

    #[test]
    fn quote_identifier_per_dialect() {
        assert_eq!(Dialect::Sqlite.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
    }

    #[test]
    fn quote_identifier_escaping() {
        assert_eq!(
            Dialect::Sqlite.quote_identifier("weird\"name"),
            "\"weird\"\"name\""
        );
        assert_eq!(
            Dialect::MySql.quote_identifier("weird`name"),
            "`weird``name`"
        );
    }

    #[test]
    fn format_bool() {
        assert_eq!(Dialect::Sqlite.format_bool(true), "1");
        assert_eq!(Dialect::MySql.format_bool(false), "0");
    }

    #[test]
    fn concat_operator_support() {
        assert!(Dialect::Sqlite.supports_concat_operator());
        assert!(!Dialect::MySql.supports_concat_operator());
    }
}
