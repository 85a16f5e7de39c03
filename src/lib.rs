//! # Tessera
//!
//! A polyglot relational data-access layer: a structured query and expression
//! algebra compiled to per-dialect SQL, a bidirectional type-marshalling
//! layer (the [`Caster`](caster::Caster)), and a schema synchronizer that
//! evolves live tables to match a declared [`Model`](model::Model).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │         caller: Selection { table, query, fields }       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [driver method]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Driver (Sqlite | MySql)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [builder::QueryBuilder]
//! ┌─────────────────────────────────────────────────────────┐
//! │      QueryExpr / EvalExpr  →  sql::Expr / sql::Query      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql::dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    dialect SQL text                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [transport: rusqlite | sqlx]
//! ┌─────────────────────────────────────────────────────────┐
//! │           result rows  →  caster::Caster::load            │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod caster;
pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod escape;
pub mod field;
pub mod model;
pub mod query_expr;
pub(crate) mod row_eval;
pub mod schema;
pub mod sql;
pub mod value;

pub use database::Database;
pub use driver::{Driver, Selection, Stats};
pub use error::{Error, Result};
pub use field::{Field, FieldType};
pub use model::{Model, ModelError, ModelRegistry};
pub use query_expr::{EvalExpr, FieldQuery, QueryExpr};
pub use sql::dialect::Dialect;
pub use value::Value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::builder::QueryBuilder;
    pub use crate::caster::Caster;
    pub use crate::database::Database;
    pub use crate::driver::{Driver, Selection, Stats};
    pub use crate::error::{Error, Result};
    pub use crate::field::{Field, FieldType};
    pub use crate::model::{Model, ModelRegistry};
    pub use crate::query_expr::{EvalExpr, FieldQuery, QueryExpr};
    pub use crate::sql::dialect::Dialect;
    pub use crate::value::Value;
}
