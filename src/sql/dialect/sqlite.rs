//! SQLite SQL dialect.
//!
//! Differences from MySQL that matter to this crate:
//! - Double-quoted identifiers (`"name"`)
//! - `INTEGER PRIMARY KEY` is itself the rowid alias — no separate
//!   `AUTOINCREMENT` is needed for ordinary use, but we emit it anyway to
//!   guarantee monotonic ids across deletes, matching the synchronizer's
//!   assumption that ids are never reused
//! - `INSERT ... ON CONFLICT (...) DO UPDATE SET ...` for upserts
//! - `||` is native string concatenation

use super::helpers;
use super::SqlDialect;
use crate::field::FieldType;
use crate::sql::token::{Token, TokenStream};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_field_type(
        &self,
        ty: FieldType,
        length: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
    ) -> String {
        helpers::emit_field_type_sqlite(ty, length, precision, scale)
    }

    fn emit_primary_key_column(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("INTEGER PRIMARY KEY AUTOINCREMENT".into()));
        ts
    }

    fn emit_upsert(&self, conflict_columns: &[String], update_columns: &[String]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("ON CONFLICT".into())).space().lparen();
        for (i, c) in conflict_columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(c.clone()));
        }
        ts.rparen()
            .space()
            .push(Token::Raw("DO UPDATE SET".into()))
            .space();
        for (i, c) in update_columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(c.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .push(Token::Raw("excluded.".into()))
                .push(Token::Ident(c.clone()));
        }
        ts
    }

    fn last_insert_id_expr(&self) -> &'static str {
        "last_insert_rowid()"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers_with_double_quotes() {
        assert_eq!(Sqlite.quote_identifier("id"), "\"id\"");
    }

    #[test]
    fn field_type_unsigned_has_no_sqlite_equivalent_so_falls_back_to_integer() {
        assert_eq!(
            Sqlite.emit_field_type(FieldType::Unsigned, None, None, None),
            "INTEGER"
        );
    }

    #[test]
    fn upsert_uses_on_conflict_do_update() {
        let ts = Sqlite.emit_upsert(&["id".into()], &["name".into()]);
        let sql = ts.serialize(crate::sql::dialect::Dialect::Sqlite);
        assert!(sql.starts_with("ON CONFLICT (\"id\") DO UPDATE SET"));
        assert!(sql.ends_with("\"name\" = excluded.\"name\""));
    }
}
