//! Expression AST - the core of SQL expression building.
//!
//! A strongly-typed AST for SQL expressions with exhaustive pattern matching
//! enforced by the compiler. This is the compilation target for both the
//! structured query algebra ([`crate::query_expr::QueryExpr`]) and the
//! arithmetic/accessor algebra ([`crate::query_expr::EvalExpr`]); neither
//! front-end exposes CASE, window functions, or BETWEEN, so this AST omits
//! them too.

use super::dialect::{Dialect, SqlDialect};
use super::query::Query;
use super::token::{Token, TokenStream};

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens_for_dialect` — the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column.
    Column { table: Option<String>, column: String },

    Literal(Literal),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: `name(args...)`.
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// Subquery: `(SELECT ...)`.
    Subquery(Box<Query>),

    /// `expr IN (values...)`, or `expr NOT IN (values...)`.
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// `expr IN (SELECT ...)`.
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },

    /// `expr IS NULL` / `expr IS NOT NULL`.
    IsNull { expr: Box<Expr>, negated: bool },

    /// Wildcard: `*` or `table.*`.
    Star { table: Option<String> },

    /// Parenthesized expression.
    Paren(Box<Expr>),

    /// Raw SQL passed directly to output without escaping.
    ///
    /// # Security
    ///
    /// Never pass user input to this variant — it is not sanitized. Only
    /// trusted, static fragments belong here (a dialect-specific JSON path
    /// accessor, for instance). User-supplied values always flow through
    /// `Expr::Literal`.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,
    Like,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                if *op == BinaryOperator::Concat && !dialect.supports_concat_operator() {
                    ts.push(Token::FunctionName("CONCAT".into())).lparen();
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.comma().space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                    ts.rparen();
                } else {
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.space();
                    ts.push(binary_op_to_token(*op));
                    ts.space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                }
            }

            Expr::UnaryOp { op, expr } => {
                ts.push(match op {
                    UnaryOperator::Not => Token::Not,
                    UnaryOperator::Minus => Token::Minus,
                });
                ts.space();
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function { name, args, distinct } => {
                let fn_name = dialect.remap_function(name).unwrap_or(name);
                ts.push(Token::FunctionName(fn_name.into())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::In { expr, values, negated } => {
                // "x IN ()" is invalid SQL; an empty list is vacuously
                // false (or true, negated).
                if values.is_empty() {
                    ts.push(if *negated { Token::True } else { Token::False });
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::InSubquery { expr, subquery, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(if *negated { Token::IsNotNull } else { Token::IsNull });
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Raw(s) => {
                ts.push(Token::Raw(s.clone()));
            }
        }

        ts
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Mod => Token::Mod,
        BinaryOperator::Concat => Token::Concat,
        BinaryOperator::Like => Token::Raw("LIKE".into()),
        BinaryOperator::BitAnd => Token::BitAnd,
    }
}

// === Convenience constructors ===

pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column { table: None, column: name.into() }
}

pub fn table_col(table: impl Into<String>, name: impl Into<String>) -> Expr {
    Expr::Column { table: Some(table.into()), column: name.into() }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: impl Into<String>) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Function { name: name.into(), args, distinct: false }
}

pub fn star() -> Expr {
    Expr::Star { table: None }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        lit_str(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

/// Convert a runtime [`crate::value::Value`] into its literal expression.
/// Lists and json values are not representable as a scalar SQL literal —
/// the caster dumps them to text before they ever reach this conversion.
impl From<&crate::value::Value> for Expr {
    fn from(v: &crate::value::Value) -> Self {
        use crate::value::Value;
        match v {
            Value::Null => lit_null(),
            Value::Bool(b) => lit_bool(*b),
            Value::Int(i) => lit_int(*i),
            Value::Float(f) => lit_float(*f),
            Value::String(s) => lit_str(s.clone()),
            Value::Date(d) => lit_str(d.to_string()),
            Value::Time(t) => lit_str(t.to_string()),
            Value::Timestamp(ts) => lit_str(ts.to_string()),
            Value::List(_) | Value::Json(_) => {
                lit_str(serde_json::to_string(v).unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_op_serializes_infix() {
        let e = Expr::BinaryOp {
            left: Box::new(col("age")),
            op: BinaryOperator::Gte,
            right: Box::new(lit_int(18)),
        };
        assert_eq!(
            e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite),
            "\"age\" >= 18"
        );
    }

    #[test]
    fn concat_falls_back_to_function_on_mysql() {
        let e = Expr::BinaryOp {
            left: Box::new(col("first")),
            op: BinaryOperator::Concat,
            right: Box::new(col("last")),
        };
        assert_eq!(
            e.to_tokens_for_dialect(Dialect::MySql).serialize(Dialect::MySql),
            "CONCAT(`first`, `last`)"
        );
        assert_eq!(
            e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite),
            "\"first\" || \"last\""
        );
    }

    #[test]
    fn empty_in_list_is_vacuously_false() {
        let e = Expr::In { expr: Box::new(col("id")), values: vec![], negated: false };
        assert_eq!(
            e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite),
            "FALSE"
        );
    }

    #[test]
    fn value_conversion_serializes_lists_as_json_text() {
        let v = crate::value::Value::List(vec![crate::value::Value::Int(1), crate::value::Value::Int(2)]);
        let e: Expr = (&v).into();
        match e {
            Expr::Literal(Literal::String(s)) => assert_eq!(s, "[1,2]"),
            _ => panic!("expected string literal"),
        }
    }
}
