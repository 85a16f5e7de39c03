//! DDL (Data Definition Language) support.
//!
//! Types and builders for the three statements the synchronizer ever emits:
//! `CREATE TABLE`, `ALTER TABLE ... ADD COLUMN`, and `ALTER TABLE ... RENAME
//! COLUMN` (used for legacy-alias migrations, see [`crate::schema`]). No
//! indexes, views, or foreign keys — a [`Model`](crate::model::Model) has no
//! vocabulary for them.
//!
//! ```ignore
//! use tessera::sql::ddl::CreateTable;
//! use tessera::sql::dialect::Dialect;
//!
//! let table = CreateTable::new("users").if_not_exists();
//! println!("{}", table.to_sql(Dialect::MySql));
//! ```

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};
use crate::field::FieldType;

/// DDL statement types.
#[derive(Debug, Clone)]
pub enum DdlStatement {
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    DropTable(DropTable),
}

impl DdlStatement {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        match self {
            DdlStatement::CreateTable(ct) => ct.to_tokens(dialect),
            DdlStatement::AlterTable(at) => at.to_tokens(dialect),
            DdlStatement::DropTable(dt) => dt.to_tokens(dialect),
        }
    }
}

/// `CREATE TABLE` statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub if_not_exists: bool,
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl CreateTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { if_not_exists: false, name: name.into(), columns: Vec::new() }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(cols);
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create).space().push(Token::Table);

        if self.if_not_exists && dialect.supports_if_not_exists() {
            ts.space().push(Token::IfNotExists);
        }

        ts.space().push(Token::Ident(self.name.clone()));
        ts.space().lparen();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&col.to_tokens(dialect));
        }
        ts.rparen();

        ts
    }
}

/// Column definition for `CREATE TABLE` / `ADD COLUMN`.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub ty: FieldType,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub nullable: bool,
    pub default: Option<Expr>,
    pub primary_key: bool,
    pub unique: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
        }
    }

    pub fn from_field(field: &crate::field::Field) -> Self {
        Self {
            name: field.name.clone(),
            ty: field.ty,
            length: field.length,
            precision: field.precision,
            scale: field.scale,
            nullable: field.nullable,
            default: None,
            primary_key: matches!(field.ty, FieldType::Primary),
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()));

        if self.primary_key {
            ts.space().append(&dialect.emit_primary_key_column());
            return ts;
        }

        ts.space().push(Token::Raw(dialect.emit_field_type(
            self.ty,
            self.length,
            self.precision,
            self.scale,
        )));

        if self.nullable {
            ts.space().push(Token::Null);
        } else {
            ts.space().push(Token::Not).space().push(Token::Null);
        }

        if let Some(expr) = &self.default {
            ts.space()
                .push(Token::Default)
                .space()
                .append(&expr.to_tokens_for_dialect(dialect));
        }

        if self.unique {
            ts.space().push(Token::Unique);
        }

        ts
    }
}

/// `ALTER TABLE` statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct AlterTable {
    pub name: String,
    pub actions: Vec<AlterAction>,
}

impl AlterTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), actions: Vec::new() }
    }

    pub fn add_column(mut self, column: ColumnDef) -> Self {
        self.actions.push(AlterAction::AddColumn(column));
        self
    }

    pub fn rename_column(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.actions.push(AlterAction::RenameColumn { from: from.into(), to: to.into() });
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Alter).space().push(Token::Table).space();
        ts.push(Token::Ident(self.name.clone()));

        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.space().append(&action.to_tokens(dialect));
        }

        ts
    }
}

/// `ALTER TABLE` actions. Limited to what the synchronizer emits — adding a
/// column, or renaming one to pick up a declared legacy alias.
#[derive(Debug, Clone)]
pub enum AlterAction {
    AddColumn(ColumnDef),
    RenameColumn { from: String, to: String },
}

impl AlterAction {
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            AlterAction::AddColumn(col) => {
                ts.push(Token::Add).space().push(Token::Column).space();
                ts.append(&col.to_tokens(dialect));
            }
            AlterAction::RenameColumn { from, to } => {
                ts.push(Token::Raw("RENAME COLUMN".into()))
                    .space()
                    .push(Token::Ident(from.clone()))
                    .space()
                    .push(Token::Raw("TO".into()))
                    .space()
                    .push(Token::Ident(to.clone()));
            }
        }
        ts
    }
}

/// `DROP TABLE` statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropTable {
    pub if_exists: bool,
    pub name: String,
}

impl DropTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { if_exists: false, name: name.into() }
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop).space().push(Token::Table);
        if self.if_exists {
            ts.space().push(Token::Exists);
        }
        ts.space().push(Token::Ident(self.name.clone()));
        let _ = dialect;
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_renders_primary_key_and_columns() {
        let ct = CreateTable::new("users")
            .if_not_exists()
            .column(ColumnDef::new("id", FieldType::Primary))
            .column(ColumnDef::new("name", FieldType::String).not_null());

        assert_eq!(
            ct.to_sql(Dialect::Sqlite),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT NOT NULL)"
        );
    }

    #[test]
    fn alter_table_add_column() {
        let at = AlterTable::new("users").add_column(ColumnDef::new("bio", FieldType::Text));
        assert_eq!(
            at.to_sql(Dialect::MySql),
            "ALTER TABLE `users` ADD COLUMN `bio` TEXT NULL"
        );
    }

    #[test]
    fn alter_table_rename_column() {
        let at = AlterTable::new("posts").rename_column("caption", "text");
        assert_eq!(
            at.to_sql(Dialect::Sqlite),
            "ALTER TABLE \"posts\" RENAME COLUMN \"caption\" TO \"text\""
        );
    }

    #[test]
    fn drop_table_if_exists() {
        let dt = DropTable::new("temp").if_exists();
        assert_eq!(dt.to_sql(Dialect::Sqlite), "DROP TABLE IF EXISTS \"temp\"");
    }
}
