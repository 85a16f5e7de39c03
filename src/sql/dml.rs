//! DML (Data Manipulation Language) support.
//!
//! `Insert`, `Update`, `Delete`. No MERGE — the spec's upsert need is
//! covered by [`SqlDialect::emit_upsert`], which renders SQLite's
//! `ON CONFLICT ... DO UPDATE` or MySQL's `ON DUPLICATE KEY UPDATE`
//! depending on the active dialect.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{BinaryOperator, Expr};
use super::token::{Token, TokenStream};

/// `INSERT` statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
    /// When set, appended as an upsert tail via `SqlDialect::emit_upsert`.
    /// `conflict_columns` names the unique/primary index (SQLite only —
    /// MySQL infers the conflicting index itself).
    pub upsert: Option<(Vec<String>, Vec<String>)>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self { table: table.into(), columns: Vec::new(), values: Vec::new(), upsert: None }
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    pub fn values(mut self, vals: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.values.push(vals.into_iter().map(|v| v.into()).collect());
        self
    }

    /// Turn this insert into an upsert: on a primary/unique conflict,
    /// overwrite `update_columns` with the values just inserted.
    pub fn upsert(mut self, conflict_columns: Vec<String>, update_columns: Vec<String>) -> Self {
        self.upsert = Some((conflict_columns, update_columns));
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Insert).space().push(Token::Into).space();
        ts.push(Token::Ident(self.table.clone()));

        if !self.columns.is_empty() {
            ts.space().lparen();
            for (i, col) in self.columns.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(col.clone()));
            }
            ts.rparen();
        }

        if !self.values.is_empty() {
            ts.space().push(Token::Values);
            for (row_idx, row) in self.values.iter().enumerate() {
                if row_idx > 0 {
                    ts.comma();
                }
                ts.space().lparen();
                for (i, val) in row.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&val.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }
        }

        if let Some((conflict_columns, update_columns)) = &self.upsert {
            ts.space().append(&dialect.emit_upsert(conflict_columns, update_columns));
        }

        ts
    }
}

/// `UPDATE` statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Update {
    pub table: String,
    pub set: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self { table: table.into(), set: Vec::new(), filter: None }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => Expr::BinaryOp {
                left: Box::new(existing),
                op: BinaryOperator::And,
                right: Box::new(expr),
            },
            None => expr,
        });
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Update).space().push(Token::Ident(self.table.clone()));

        ts.space().push(Token::Set).space();
        for (i, (col, expr)) in self.set.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .append(&expr.to_tokens_for_dialect(dialect));
        }

        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(&filter.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

/// `DELETE` statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Delete {
    pub table: String,
    pub filter: Option<Expr>,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self { table: table.into(), filter: None }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => Expr::BinaryOp {
                left: Box::new(existing),
                op: BinaryOperator::And,
                right: Box::new(expr),
            },
            None => expr,
        });
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Delete).space().push(Token::From).space();
        ts.push(Token::Ident(self.table.clone()));

        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(&filter.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::expr::{col, lit_int, lit_str};

    #[test]
    fn insert_renders_values() {
        let ins = Insert::into("users")
            .columns(["id", "name"])
            .values([lit_int(1), lit_str("ann")]);
        assert_eq!(
            ins.to_sql(Dialect::Sqlite),
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES (1, 'ann')"
        );
    }

    #[test]
    fn insert_upsert_dispatches_per_dialect() {
        let ins = Insert::into("users")
            .columns(["id", "name"])
            .values([lit_int(1), lit_str("ann")])
            .upsert(vec!["id".into()], vec!["name".into()]);

        assert!(ins.to_sql(Dialect::Sqlite).contains("ON CONFLICT (\"id\") DO UPDATE SET"));
        assert!(ins.to_sql(Dialect::MySql).contains("ON DUPLICATE KEY UPDATE"));
    }

    #[test]
    fn update_renders_set_and_where() {
        let upd = Update::table("users").set("name", lit_str("bob")).filter(Expr::BinaryOp {
            left: Box::new(col("id")),
            op: BinaryOperator::Eq,
            right: Box::new(lit_int(1)),
        });
        assert_eq!(
            upd.to_sql(Dialect::MySql),
            "UPDATE `users` SET `name` = 'bob' WHERE `id` = 1"
        );
    }

    #[test]
    fn delete_renders_where() {
        let del = Delete::from("users").filter(Expr::BinaryOp {
            left: Box::new(col("id")),
            op: BinaryOperator::Eq,
            right: Box::new(lit_int(7)),
        });
        assert_eq!(del.to_sql(Dialect::Sqlite), "DELETE FROM \"users\" WHERE \"id\" = 7");
    }
}
