//! MySQL SQL dialect.
//!
//! Differences from SQLite that matter to this crate:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is `TINYINT(1)`, round-trips as 1/0
//! - `||` is logical OR by default — the query compiler emits `CONCAT()`
//!   here instead (see [`SqlDialect::supports_concat_operator`])
//! - `INSERT ... ON DUPLICATE KEY UPDATE` for upserts
//! - `LAST_INSERT_ID()` instead of `last_insert_rowid()`

use super::helpers;
use super::SqlDialect;
use crate::field::FieldType;
use crate::sql::token::{Token, TokenStream};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn concat_operator(&self) -> &'static str {
        "||"
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_mysql(name)
    }

    fn emit_field_type(
        &self,
        ty: FieldType,
        length: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
    ) -> String {
        helpers::emit_field_type_mysql(ty, length, precision, scale)
    }

    fn emit_primary_key_column(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("BIGINT PRIMARY KEY AUTO_INCREMENT".into()));
        ts
    }

    fn emit_upsert(&self, _conflict_columns: &[String], update_columns: &[String]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::OnDuplicateKeyUpdate).space();
        for (i, c) in update_columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(c.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .push(Token::Raw("VALUES(".into()))
                .push(Token::Ident(c.clone()))
                .push(Token::Raw(")".into()));
        }
        ts
    }

    fn last_insert_id_expr(&self) -> &'static str {
        "LAST_INSERT_ID()"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers_with_backticks() {
        assert_eq!(MySql.quote_identifier("id"), "`id`");
    }

    #[test]
    fn does_not_support_pipe_concat() {
        assert!(!MySql.supports_concat_operator());
    }

    #[test]
    fn upsert_uses_on_duplicate_key_update() {
        let ts = MySql.emit_upsert(&[], &["name".into()]);
        let sql = ts.serialize(crate::sql::dialect::Dialect::MySql);
        assert_eq!(sql, "ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)");
    }
}
