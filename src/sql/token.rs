//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize to
//! dialect-specific strings.

use super::dialect::{Dialect, SqlDialect};

/// SQL Token - every possible element in a SQL statement.
///
/// Adding a new variant here will cause compile errors everywhere it needs
/// to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    GroupBy,
    Having,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    In,
    IsNull,
    IsNotNull,
    Distinct,
    Null,
    True,
    False,

    // === DDL Keywords ===
    Create,
    Alter,
    Drop,
    Table,
    Column,
    Constraint,
    Primary,
    Key,
    Unique,
    Default,
    Add,
    If,
    IfNotExists,
    Exists,

    // === DML Keywords ===
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    OnDuplicateKeyUpdate,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,
    BitAnd,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias).
    Ident(String),
    /// Qualified identifier: `table.column`.
    QualifiedIdent { table: Option<String>, name: String },
    LitInt(i64),
    LitFloat(f64),
    LitString(String),
    LitBool(bool),
    LitNull,

    /// Function name, upper-cased on output (allows future dialect
    /// remapping, e.g. `substr` → `SUBSTRING` on a dialect that wants it).
    FunctionName(String),

    /// Raw SQL passed directly to output without escaping.
    ///
    /// # Security
    ///
    /// Never pass user input to this variant — it is not escaped. Only
    /// trusted, static fragments (dialect-specific syntax with no other
    /// token) belong here.
    Raw(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Having => "HAVING".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::In => "IN".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::Null => "NULL".into(),
            Token::True => "TRUE".into(),
            Token::False => "FALSE".into(),

            Token::Create => "CREATE".into(),
            Token::Alter => "ALTER".into(),
            Token::Drop => "DROP".into(),
            Token::Table => "TABLE".into(),
            Token::Column => "COLUMN".into(),
            Token::Constraint => "CONSTRAINT".into(),
            Token::Primary => "PRIMARY".into(),
            Token::Key => "KEY".into(),
            Token::Unique => "UNIQUE".into(),
            Token::Default => "DEFAULT".into(),
            Token::Add => "ADD".into(),
            Token::If => "IF".into(),
            Token::IfNotExists => "IF NOT EXISTS".into(),
            Token::Exists => "IF EXISTS".into(),

            Token::Insert => "INSERT".into(),
            Token::Into => "INTO".into(),
            Token::Values => "VALUES".into(),
            Token::Update => "UPDATE".into(),
            Token::Set => "SET".into(),
            Token::Delete => "DELETE".into(),
            Token::OnDuplicateKeyUpdate => "ON DUPLICATE KEY UPDATE".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),
            Token::Mod => dialect.modulo_operator().into(),
            Token::Concat => dialect.concat_operator().into(),
            Token::BitAnd => "&".into(),

            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { table, name } => match table {
                Some(t) => format!(
                    "{}.{}",
                    dialect.quote_identifier(t),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                if f.is_nan() {
                    panic!("cannot serialize NaN to SQL");
                }
                if f.is_infinite() {
                    panic!("cannot serialize Infinity to SQL");
                }
                let mut buffer = ryu::Buffer::new();
                buffer.format(*f).to_string()
            }
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::LitNull => "NULL".into(),

            Token::FunctionName(name) => name.to_uppercase(),

            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }

    /// Join a collection of sub-streams with `Comma, Space`.
    pub fn join_comma(streams: impl IntoIterator<Item = TokenStream>) -> TokenStream {
        let mut out = TokenStream::new();
        for (i, s) in streams.into_iter().enumerate() {
            if i > 0 {
                out.comma().space();
            }
            out.append(&s);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_serialize() {
        assert_eq!(Token::Select.serialize(Dialect::Sqlite), "SELECT");
        assert_eq!(Token::GroupBy.serialize(Dialect::MySql), "GROUP BY");
    }

    #[test]
    fn ident_serialize_per_dialect() {
        let tok = Token::Ident("users".into());
        assert_eq!(tok.serialize(Dialect::Sqlite), "\"users\"");
        assert_eq!(tok.serialize(Dialect::MySql), "`users`");
    }

    #[test]
    fn qualified_ident() {
        let tok = Token::QualifiedIdent {
            table: Some("t".into()),
            name: "id".into(),
        };
        assert_eq!(tok.serialize(Dialect::MySql), "`t`.`id`");
    }

    #[test]
    fn token_stream_builds_select() {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Ident("name".into()))
            .space()
            .push(Token::From)
            .space()
            .push(Token::Ident("users".into()));
        assert_eq!(
            ts.serialize(Dialect::Sqlite),
            "SELECT \"name\" FROM \"users\""
        );
    }

    #[test]
    fn float_serialize() {
        assert_eq!(Token::LitFloat(3.14).serialize(Dialect::Sqlite), "3.14");
        assert_eq!(Token::LitFloat(1.0).serialize(Dialect::Sqlite), "1.0");
    }

    #[test]
    #[should_panic(expected = "cannot serialize NaN")]
    fn float_nan_panics() {
        Token::LitFloat(f64::NAN).serialize(Dialect::Sqlite);
    }
}
