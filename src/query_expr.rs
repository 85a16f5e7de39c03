//! The caller-facing query and expression algebra.
//!
//! `QueryExpr`/`FieldQuery` are the Mongo-style structured filter language
//! (`{field: {$gt: 1}}`, `{$and: [...]}`, ...); `EvalExpr` is the arithmetic/
//! accessor language used for `set` update values, `eval` scalars, and
//! computed projections. Both are closed tagged sum types — per §9 of the
//! design notes, unknown operators are a compile-time ([`crate::builder`])
//! rejection, not a runtime one, so there is no open-ended "other" variant
//! here to smuggle one through.

use crate::value::Value;

/// A single operator applied to one field's value.
///
/// Several of these only make sense for particular [`FieldType`]s
/// (`$bitsAllSet` on a non-integer field, `$size` on a non-list field) —
/// that validation happens in the builder, which has the model in scope;
/// this type itself is untyped so it can represent any operator shape a
/// caller writes.
///
/// [`FieldType`]: crate::field::FieldType
#[derive(Debug, Clone, PartialEq)]
pub enum FieldQuery {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    /// Case-sensitive regex match.
    Regex(String),
    /// Case-insensitive regex match (`$regexFor`).
    RegexFor(String),
    Exists(bool),
    BitsAllSet(i64),
    BitsAllClear(i64),
    BitsAnySet(i64),
    BitsAnyClear(i64),
    /// `$el`: at least one element of a list field equals this scalar
    /// value. The match value must itself be scalar — `$el` against a
    /// list or json value is a query-malformed error at compile time.
    El(Value),
    /// `$size`: list field has exactly this many elements.
    Size(u64),
}

/// A structured filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    /// One or more operators applied to a single (possibly dotted) field
    /// path. `{field: literal}` desugars to `Field { queries: [Eq(literal)] }`.
    Field { path: String, queries: Vec<FieldQuery> },
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
    Not(Box<QueryExpr>),
    /// `$expr`: an [`EvalExpr`] used as a boolean filter, compiled via
    /// `QueryBuilder::parse_eval` and used directly in WHERE position.
    Expr(Box<EvalExpr>),
}

impl QueryExpr {
    /// The empty filter `{}` — matches every row.
    pub fn all() -> Self {
        QueryExpr::And(Vec::new())
    }

    pub fn field(path: impl Into<String>, queries: Vec<FieldQuery>) -> Self {
        QueryExpr::Field { path: path.into(), queries }
    }

    pub fn eq(path: impl Into<String>, v: impl Into<Value>) -> Self {
        QueryExpr::field(path, vec![FieldQuery::Eq(v.into())])
    }

    pub fn and(clauses: Vec<QueryExpr>) -> Self {
        QueryExpr::And(clauses)
    }

    pub fn or(clauses: Vec<QueryExpr>) -> Self {
        QueryExpr::Or(clauses)
    }

    pub fn not(inner: QueryExpr) -> Self {
        QueryExpr::Not(Box::new(inner))
    }

    pub fn expr(e: EvalExpr) -> Self {
        QueryExpr::Expr(Box::new(e))
    }

    /// Split a dotted field path into its segments (`"a.b.c"` ->
    /// `["a", "b", "c"]`). The first segment names the declared column; the
    /// rest, if any, is a JSON accessor path within it.
    pub fn path_segments(path: &str) -> Vec<&str> {
        path.split('.').collect()
    }
}

/// An arithmetic/accessor expression: update values, `eval` scalars, and
/// computed projections are all one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalExpr {
    Literal(Value),
    /// Field or dotted JSON path accessor, relative to the row.
    Path(String),

    Add(Vec<EvalExpr>),
    Multiply(Vec<EvalExpr>),
    Subtract(Box<EvalExpr>, Box<EvalExpr>),
    Divide(Box<EvalExpr>, Box<EvalExpr>),

    Eq(Box<EvalExpr>, Box<EvalExpr>),
    Ne(Box<EvalExpr>, Box<EvalExpr>),
    Gt(Box<EvalExpr>, Box<EvalExpr>),
    Gte(Box<EvalExpr>, Box<EvalExpr>),
    Lt(Box<EvalExpr>, Box<EvalExpr>),
    Lte(Box<EvalExpr>, Box<EvalExpr>),

    And(Vec<EvalExpr>),
    Or(Vec<EvalExpr>),
    Not(Box<EvalExpr>),

    Concat(Vec<EvalExpr>),
    If { cond: Box<EvalExpr>, then: Box<EvalExpr>, else_: Box<EvalExpr> },
    IfNull(Box<EvalExpr>, Box<EvalExpr>),

    Sum(Box<EvalExpr>),
    Avg(Box<EvalExpr>),
    Min(Box<EvalExpr>),
    Max(Box<EvalExpr>),
    /// Distinct non-null count, per §8 scenario 4 (`$count` over a field).
    Count(Box<EvalExpr>),

    /// `$length`: element count for a list field, `json_array_length` for a
    /// json field — the builder picks the SQL form from the field's
    /// declared type, this node just names the operand.
    Length(Box<EvalExpr>),
}

impl EvalExpr {
    pub fn lit(v: impl Into<Value>) -> Self {
        EvalExpr::Literal(v.into())
    }

    pub fn path(p: impl Into<String>) -> Self {
        EvalExpr::Path(p.into())
    }

    /// Whether this expression is an aggregation that requires GROUP BY-
    /// aware compilation (§4.3's aggregation-wrapping rule).
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            EvalExpr::Sum(_) | EvalExpr::Avg(_) | EvalExpr::Min(_) | EvalExpr::Max(_) | EvalExpr::Count(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_and_of_nothing() {
        assert_eq!(QueryExpr::all(), QueryExpr::And(Vec::new()));
    }

    #[test]
    fn path_segments_split_on_dot() {
        assert_eq!(QueryExpr::path_segments("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(QueryExpr::path_segments("id"), vec!["id"]);
    }

    #[test]
    fn eq_shorthand_builds_single_operator_field_query() {
        let q = QueryExpr::eq("id", 1i64);
        assert_eq!(q, QueryExpr::Field { path: "id".into(), queries: vec![FieldQuery::Eq(Value::Int(1))] });
    }

    #[test]
    fn aggregate_detection() {
        assert!(EvalExpr::Sum(Box::new(EvalExpr::path("num"))).is_aggregate());
        assert!(!EvalExpr::path("num").is_aggregate());
    }
}
