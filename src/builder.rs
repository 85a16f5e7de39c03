//! Query compiler: turns the caller-facing [`QueryExpr`]/[`EvalExpr`]
//! algebra into [`sql::Expr`]/[`sql::Query`] for a specific [`Model`] and
//! [`Dialect`].
//!
//! Per §9 of the design notes this is a base component ([`QueryBuilder`])
//! with per-dialect behavior expressed as small match arms on `self.dialect`
//! rather than a struct-per-dialect hierarchy — the divergence between
//! SQLite and MySQL here is a handful of function names and one operator
//! fallback, not enough surface to justify two trait implementations. A
//! compilation context is threaded explicitly as the method receiver
//! (`&self`, carrying `model`/`dialect`) plus an explicit `group: bool`
//! parameter on the aggregation path, rather than mutable shared state.

use crate::error::{Error, Result};
use crate::field::FieldType;
use crate::model::Model;
use crate::query_expr::{EvalExpr, FieldQuery, QueryExpr};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{col, func, lit_bool, lit_int, lit_str, BinaryOperator, Expr, Literal, UnaryOperator};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, SortDir, TableRef};
use crate::{escape, value::Value};

/// Compiles [`QueryExpr`]/[`EvalExpr`] trees against one [`Model`] for one
/// [`Dialect`]. Stateless and cheap to construct — one per compilation,
/// matching the "re-entrant only within one operation" discipline of §5.
pub struct QueryBuilder<'a> {
    model: &'a Model,
    dialect: Dialect,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(model: &'a Model, dialect: Dialect) -> Self {
        Self { model, dialect }
    }

    // === Query (filter) compilation ===

    /// Compile a structured filter to a boolean SQL expression, applying the
    /// logical-reduction normalization: `$and` of nothing is `"1"` (always
    /// true), `$or` of nothing is `"0"` (always false), and either
    /// short-circuits as soon as a literal child settles the outcome.
    pub fn parse_query(&self, q: &QueryExpr) -> Result<Expr> {
        match q {
            QueryExpr::Field { path, queries } => self.parse_field_queries(path, queries),

            QueryExpr::And(children) => {
                let mut kept = Vec::with_capacity(children.len());
                for child in children {
                    let compiled = self.parse_query(child)?;
                    match as_literal_bool(&compiled) {
                        Some(false) => return Ok(lit_bool(false)),
                        Some(true) => continue,
                        None => kept.push(compiled),
                    }
                }
                Ok(fold_logical(kept, BinaryOperator::And, true))
            }

            QueryExpr::Or(children) => {
                let mut kept = Vec::with_capacity(children.len());
                for child in children {
                    let compiled = self.parse_query(child)?;
                    match as_literal_bool(&compiled) {
                        Some(true) => return Ok(lit_bool(true)),
                        Some(false) => continue,
                        None => kept.push(compiled),
                    }
                }
                Ok(fold_logical(kept, BinaryOperator::Or, false))
            }

            QueryExpr::Not(inner) => {
                let compiled = self.parse_query(inner)?;
                Ok(match as_literal_bool(&compiled) {
                    Some(b) => lit_bool(!b),
                    None => Expr::UnaryOp { op: UnaryOperator::Not, expr: Box::new(Expr::Paren(Box::new(compiled))) },
                })
            }

            // `$expr`: compile the nested eval expression and use its result
            // directly as a boolean filter. No extra truthiness coercion —
            // the comparison/logical nodes under `EvalExpr` already compile
            // to boolean SQL, same as they do in a `set`/`eval` position.
            QueryExpr::Expr(inner) => self.parse_eval(inner),
        }
    }

    fn parse_field_queries(&self, path: &str, queries: &[FieldQuery]) -> Result<Expr> {
        let mut kept = Vec::with_capacity(queries.len());
        for fq in queries {
            kept.push(self.parse_field_query(path, fq)?);
        }
        Ok(fold_logical(kept, BinaryOperator::And, true))
    }

    fn parse_field_query(&self, path: &str, fq: &FieldQuery) -> Result<Expr> {
        let target = self.resolve_path(path)?;
        match fq {
            FieldQuery::Eq(Value::Null) => Ok(Expr::IsNull { expr: Box::new(target), negated: false }),
            FieldQuery::Eq(v) => Ok(binop(target, BinaryOperator::Eq, self.escape(v))),
            FieldQuery::Ne(Value::Null) => Ok(Expr::IsNull { expr: Box::new(target), negated: true }),
            FieldQuery::Ne(v) => Ok(binop(target, BinaryOperator::Ne, self.escape(v))),
            FieldQuery::Gt(v) => Ok(binop(target, BinaryOperator::Gt, self.escape(v))),
            FieldQuery::Gte(v) => Ok(binop(target, BinaryOperator::Gte, self.escape(v))),
            FieldQuery::Lt(v) => Ok(binop(target, BinaryOperator::Lt, self.escape(v))),
            FieldQuery::Lte(v) => Ok(binop(target, BinaryOperator::Lte, self.escape(v))),

            // An empty `$in` can never match — collapse to the literal
            // false short-circuit rather than emit `IN ()`, which is a
            // syntax error on both dialects. `$nin` of nothing is the dual:
            // every row satisfies "not in the empty set".
            FieldQuery::In(values) if values.is_empty() => Ok(lit_bool(false)),
            FieldQuery::Nin(values) if values.is_empty() => Ok(lit_bool(true)),
            FieldQuery::In(values) => Ok(Expr::In {
                expr: Box::new(target),
                values: values.iter().map(|v| self.escape(v)).collect(),
                negated: false,
            }),
            FieldQuery::Nin(values) => Ok(Expr::In {
                expr: Box::new(target),
                values: values.iter().map(|v| self.escape(v)).collect(),
                negated: true,
            }),

            FieldQuery::Regex(pattern) => Ok(self.regex_match(target, pattern, false)),
            FieldQuery::RegexFor(pattern) => Ok(self.regex_match(target, pattern, true)),

            FieldQuery::Exists(true) => Ok(Expr::IsNull { expr: Box::new(target), negated: true }),
            FieldQuery::Exists(false) => Ok(Expr::IsNull { expr: Box::new(target), negated: false }),

            FieldQuery::BitsAllSet(mask) => {
                Ok(binop(bit_and(target, *mask), BinaryOperator::Eq, lit_int(*mask)))
            }
            FieldQuery::BitsAllClear(mask) => {
                Ok(binop(bit_and(target, *mask), BinaryOperator::Eq, lit_int(0)))
            }
            FieldQuery::BitsAnySet(mask) => {
                Ok(binop(bit_and(target, *mask), BinaryOperator::Ne, lit_int(0)))
            }
            FieldQuery::BitsAnyClear(mask) => {
                Ok(binop(bit_and(target, *mask), BinaryOperator::Ne, lit_int(*mask)))
            }

            FieldQuery::El(v) => self.element_contains(path, target, v),
            FieldQuery::Size(n) => {
                let count = self.comma_element_count(target);
                Ok(binop(count, BinaryOperator::Eq, lit_int(*n as i64)))
            }
        }
    }

    /// `$el`: at least one comma-joined list element equals `v`. Only a
    /// scalar match value is supported — matching §7's example of a
    /// compile-time `query-malformed` rejection for a non-scalar `$el`.
    fn element_contains(&self, path: &str, target: Expr, v: &Value) -> Result<Expr> {
        match v {
            Value::List(_) | Value::Json(_) => Err(Error::query_malformed(format!(
                "$el on field `{path}` requires a scalar match value, got {}",
                v.type_name()
            ))),
            _ => {
                let needle = self.escape(v);
                // (',' || field || ',') LIKE '%,' || needle || ',%'
                let wrapped = Expr::BinaryOp {
                    left: Box::new(Expr::BinaryOp {
                        left: Box::new(lit_str(",")),
                        op: BinaryOperator::Concat,
                        right: Box::new(target),
                    }),
                    op: BinaryOperator::Concat,
                    right: Box::new(lit_str(",")),
                };
                let pattern = Expr::BinaryOp {
                    left: Box::new(Expr::BinaryOp {
                        left: Box::new(lit_str("%,")),
                        op: BinaryOperator::Concat,
                        right: Box::new(needle),
                    }),
                    op: BinaryOperator::Concat,
                    right: Box::new(lit_str(",%")),
                };
                Ok(Expr::BinaryOp { left: Box::new(wrapped), op: BinaryOperator::Like, right: Box::new(pattern) })
            }
        }
    }

    /// The comma-count formula: an empty string has zero elements, anything
    /// else has one more element than it has separators.
    fn comma_element_count(&self, target: Expr) -> Expr {
        let is_empty = binop(target.clone(), BinaryOperator::Eq, lit_str(""));
        let separators = binop(
            func("LENGTH", vec![target.clone()]),
            BinaryOperator::Minus,
            func("LENGTH", vec![func("REPLACE", vec![target, lit_str(","), lit_str("")])]),
        );
        let count = binop(separators, BinaryOperator::Plus, lit_int(1));
        self.emit_if(is_empty, lit_int(0), count)
    }

    fn regex_match(&self, target: Expr, pattern: &str, case_insensitive: bool) -> Expr {
        match self.dialect {
            // Driven by the `regexp(pattern, str)` UDF registered at
            // `start()` (§6): argument order is pattern-first.
            Dialect::Sqlite => {
                let pattern = if case_insensitive { format!("(?i){pattern}") } else { pattern.to_string() };
                func("regexp", vec![lit_str(pattern), target])
            }
            // MySQL's REGEXP is case-insensitive under the default
            // utf8mb4 collation; BINARY forces case-sensitive comparison.
            Dialect::MySql => {
                let op = if case_insensitive { "REGEXP" } else { "REGEXP BINARY" };
                Expr::Raw(format!(
                    "{} {} {}",
                    target.to_tokens_for_dialect(self.dialect).serialize(self.dialect),
                    op,
                    lit_str(pattern).to_tokens_for_dialect(self.dialect).serialize(self.dialect)
                ))
            }
        }
    }

    // === Eval expression compilation ===

    pub fn parse_eval(&self, e: &EvalExpr) -> Result<Expr> {
        match e {
            EvalExpr::Literal(v) => Ok(self.escape(v)),
            EvalExpr::Path(p) => self.resolve_path(p),

            EvalExpr::Add(items) => self.fold_arith(items, BinaryOperator::Plus, 0),
            EvalExpr::Multiply(items) => self.fold_arith(items, BinaryOperator::Mul, 1),
            EvalExpr::Subtract(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Minus, self.parse_eval(b)?)),
            EvalExpr::Divide(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Div, self.parse_eval(b)?)),

            EvalExpr::Eq(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Eq, self.parse_eval(b)?)),
            EvalExpr::Ne(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Ne, self.parse_eval(b)?)),
            EvalExpr::Gt(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Gt, self.parse_eval(b)?)),
            EvalExpr::Gte(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Gte, self.parse_eval(b)?)),
            EvalExpr::Lt(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Lt, self.parse_eval(b)?)),
            EvalExpr::Lte(a, b) => Ok(binop(self.parse_eval(a)?, BinaryOperator::Lte, self.parse_eval(b)?)),

            EvalExpr::And(items) => {
                let compiled = items.iter().map(|i| self.parse_eval(i)).collect::<Result<Vec<_>>>()?;
                Ok(fold_logical(compiled, BinaryOperator::And, true))
            }
            EvalExpr::Or(items) => {
                let compiled = items.iter().map(|i| self.parse_eval(i)).collect::<Result<Vec<_>>>()?;
                Ok(fold_logical(compiled, BinaryOperator::Or, false))
            }
            EvalExpr::Not(inner) => {
                Ok(Expr::UnaryOp { op: UnaryOperator::Not, expr: Box::new(Expr::Paren(Box::new(self.parse_eval(inner)?))) })
            }

            EvalExpr::Concat(items) => {
                let mut iter = items.iter();
                let first = match iter.next() {
                    Some(e) => self.parse_eval(e)?,
                    None => return Ok(lit_str("")),
                };
                iter.try_fold(first, |acc, next| Ok(binop(acc, BinaryOperator::Concat, self.parse_eval(next)?)))
            }

            EvalExpr::If { cond, then, else_ } => {
                Ok(self.emit_if(self.parse_eval(cond)?, self.parse_eval(then)?, self.parse_eval(else_)?))
            }
            EvalExpr::IfNull(a, b) => Ok(func("IFNULL", vec![self.parse_eval(a)?, self.parse_eval(b)?])),

            EvalExpr::Sum(inner) => self.aggregate("SUM", inner),
            EvalExpr::Avg(inner) => self.aggregate("AVG", inner),
            EvalExpr::Min(inner) => self.aggregate("MIN", inner),
            EvalExpr::Max(inner) => self.aggregate("MAX", inner),
            EvalExpr::Count(inner) => {
                let operand = self.parse_eval(inner)?;
                Ok(Expr::Function { name: "COUNT".into(), args: vec![operand], distinct: true })
            }

            EvalExpr::Length(inner) => self.length(inner),
        }
    }

    fn fold_arith(&self, items: &[EvalExpr], op: BinaryOperator, identity: i64) -> Result<Expr> {
        let mut iter = items.iter();
        let first = match iter.next() {
            Some(e) => self.parse_eval(e)?,
            None => return Ok(lit_int(identity)),
        };
        iter.try_fold(first, |acc, next| Ok(binop(acc, op, self.parse_eval(next)?)))
    }

    /// Plain aggregates operate directly on the target column. A `List` or
    /// `Json` operand is element-expanded first via a correlated
    /// `json_each`-style subquery, synthesizing a JSON array from the
    /// comma-joined storage text since the column itself isn't valid JSON.
    fn aggregate(&self, fn_name: &'static str, inner: &EvalExpr) -> Result<Expr> {
        let operand = self.parse_eval(inner)?;
        if let EvalExpr::Path(p) = inner {
            if let Some(field) = self.field_for_root(p) {
                if field.ty.is_list() || field.ty.is_json() {
                    return Ok(self.aggregate_over_elements(fn_name, &operand, field.ty));
                }
            }
        }
        Ok(func(fn_name, vec![operand]))
    }

    fn aggregate_over_elements(&self, fn_name: &'static str, column: &Expr, ty: FieldType) -> Expr {
        let json_array = match ty {
            FieldType::Json => column.clone(),
            _ => Expr::Raw(format!(
                "('[\"' || REPLACE({}, ',', '\",\"') || '\"]')",
                column.to_tokens_for_dialect(self.dialect).serialize(self.dialect)
            )),
        };
        let array_sql = json_array.to_tokens_for_dialect(self.dialect).serialize(self.dialect);
        match self.dialect {
            Dialect::Sqlite => Expr::Raw(format!("(SELECT {fn_name}(value) FROM json_each({array_sql}))")),
            Dialect::MySql => Expr::Raw(format!(
                "(SELECT {fn_name}(t.value) FROM JSON_TABLE({array_sql}, '$[*]' COLUMNS(value TEXT PATH '$')) AS t)"
            )),
        }
    }

    /// `$length`: `json_array_length` for a `Json` field, the comma-count
    /// formula for a `List` field.
    fn length(&self, inner: &EvalExpr) -> Result<Expr> {
        let operand = self.parse_eval(inner)?;
        if let EvalExpr::Path(p) = inner {
            if let Some(field) = self.field_for_root(p) {
                if field.ty.is_list() {
                    return Ok(self.comma_element_count(operand));
                }
            }
        }
        Ok(match self.dialect {
            Dialect::Sqlite => func("json_array_length", vec![operand]),
            Dialect::MySql => func("JSON_LENGTH", vec![operand]),
        })
    }

    fn emit_if(&self, cond: Expr, then: Expr, else_: Expr) -> Expr {
        match self.dialect {
            Dialect::Sqlite => func("iif", vec![cond, then, else_]),
            Dialect::MySql => func("IF", vec![cond, then, else_]),
        }
    }

    // === Shared helpers ===

    fn escape(&self, v: &Value) -> Expr {
        escape::escape_value(self.dialect, v)
    }

    fn field_for_root(&self, path: &str) -> Option<&Field> {
        let root = QueryExpr::path_segments(path).first().copied()?;
        self.model.field(root)
    }

    /// Resolve a (possibly dotted) path to a column reference or, for a
    /// nested accessor into a `Json` field, a `json_extract` call.
    fn resolve_path(&self, path: &str) -> Result<Expr> {
        let segments = QueryExpr::path_segments(path);
        let root = segments[0];
        let field = self
            .model
            .field(root)
            .ok_or_else(|| Error::query_malformed(format!("unknown field `{root}` on table `{}`", self.model.name)))?;

        if segments.len() == 1 {
            return Ok(col(root));
        }

        if !field.ty.is_json() {
            return Err(Error::query_malformed(format!(
                "field `{root}` is not a json field; cannot accessor-path into `{path}`"
            )));
        }

        let json_path = format!("$.{}", segments[1..].join("."));
        Ok(func("json_extract", vec![col(root), lit_str(json_path)]))
    }

    // === Top-level `get` compilation ===

    /// Compile a full `get(selection)` into a `SELECT`, or `None` when the
    /// filter reduces to always-false (§4.3's "Returns null when the filter
    /// reduces to `0`").
    #[allow(clippy::too_many_arguments)]
    pub fn compile_get(
        &self,
        table: &str,
        filter: &QueryExpr,
        fields: Option<&[(String, EvalExpr)]>,
        sort: &[(EvalExpr, bool)],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Option<Query>> {
        let where_clause = self.parse_query(filter)?;
        if as_literal_bool(&where_clause) == Some(false) {
            return Ok(None);
        }

        let mut query = Query::new().from(TableRef::new(table));
        query = match fields {
            Some(projection) => {
                let mut select = Vec::with_capacity(projection.len());
                for (alias, expr) in projection {
                    select.push(SelectExpr::new(self.parse_eval(expr)?).with_alias(alias));
                }
                query.select(select)
            }
            None => query.select_star(),
        };

        if as_literal_bool(&where_clause) != Some(true) {
            query = query.filter(where_clause);
        }

        if !sort.is_empty() {
            let mut order = Vec::with_capacity(sort.len());
            for (expr, ascending) in sort {
                let compiled = self.parse_eval(expr)?;
                order.push(if *ascending { OrderByExpr::asc(compiled) } else { OrderByExpr::desc(compiled) });
            }
            query = query.order_by(order);
        }

        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }

        Ok(Some(query))
    }

    // === `set` update-value compilation ===

    /// Compile `set` update values to `(column, expr)` pairs ready for
    /// [`crate::sql::dml::Update::set`]. A plain top-level path replaces the
    /// column wholesale; a dotted path into a `Json` field instead merges
    /// one key via `json_set(IFNULL(col, '{}'), '$."a"."b"', expr)` so
    /// sibling keys survive (§4.4's `set` algorithm).
    pub fn compile_set(&self, updates: &[(String, EvalExpr)]) -> Result<Vec<(String, Expr)>> {
        updates.iter().map(|(path, value)| self.compile_update_target(path, value)).collect()
    }

    fn compile_update_target(&self, path: &str, value: &EvalExpr) -> Result<(String, Expr)> {
        let segments = QueryExpr::path_segments(path);
        let root = segments[0];
        let compiled_value = self.parse_eval(value)?;

        if segments.len() == 1 {
            return Ok((root.to_string(), compiled_value));
        }

        let field = self
            .model
            .field(root)
            .ok_or_else(|| Error::query_malformed(format!("unknown field `{root}` on table `{}`", self.model.name)))?;
        if !field.ty.is_json() {
            return Err(Error::query_malformed(format!(
                "field `{root}` is not a json field; cannot accessor-path into `{path}`"
            )));
        }

        let json_path = format!("$.{}", segments[1..].join("."));
        let merged = func(
            "json_set",
            vec![func("IFNULL", vec![col(root), lit_str("{}")]), lit_str(json_path), compiled_value],
        );
        Ok((root.to_string(), merged))
    }
}

use crate::field::Field;

fn binop(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) }
}

fn bit_and(target: Expr, mask: i64) -> Expr {
    binop(target, BinaryOperator::BitAnd, lit_int(mask))
}

/// Visible to drivers so `set`/`remove` can short-circuit an always-false
/// filter without re-deriving the literal check themselves.
pub(crate) fn as_literal_bool(e: &Expr) -> Option<bool> {
    match e {
        Expr::Literal(Literal::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// Fold a list of already-reduced boolean expressions with `op`, returning
/// the neutral literal (`true` for AND's identity, `false` for OR's) when
/// the list is empty and the bare expression when there is exactly one.
fn fold_logical(mut kept: Vec<Expr>, op: BinaryOperator, identity: bool) -> Expr {
    if kept.is_empty() {
        return lit_bool(identity);
    }
    if kept.len() == 1 {
        return kept.pop().unwrap();
    }
    let mut iter = kept.into_iter();
    let first = iter.next().unwrap();
    iter.fold(first, |acc, next| binop(Expr::Paren(Box::new(acc)), op, Expr::Paren(Box::new(next))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldType};

    fn bar_model() -> Model {
        Model::new(
            "bar",
            vec![
                Field::new("id", FieldType::Primary),
                Field::new("text", FieldType::String),
                Field::new("num", FieldType::Integer),
                Field::new("bool", FieldType::Boolean),
                Field::new("meta", FieldType::Json),
                Field::new("tags", FieldType::List),
            ],
        )
        .unwrap()
    }

    #[test]
    fn empty_query_reduces_to_true() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let e = b.parse_query(&QueryExpr::all()).unwrap();
        assert_eq!(as_literal_bool(&e), Some(true));
    }

    #[test]
    fn and_short_circuits_on_false_child() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::and(vec![QueryExpr::eq("id", 1i64), QueryExpr::field("id", vec![FieldQuery::In(vec![])])]);
        let e = b.parse_query(&q).unwrap();
        assert_eq!(as_literal_bool(&e), Some(false));
    }

    #[test]
    fn or_of_empty_in_and_eq_drops_the_false_branch() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::or(vec![
            QueryExpr::field("id", vec![FieldQuery::In(vec![])]),
            QueryExpr::eq("id", 2i64),
        ]);
        let e = b.parse_query(&q).unwrap();
        assert_eq!(e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite), "\"id\" = 2");
    }

    #[test]
    fn expr_query_compiles_eval_as_boolean_filter() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::expr(EvalExpr::Gt(Box::new(EvalExpr::path("num")), Box::new(EvalExpr::lit(10i64))));
        let e = b.parse_query(&q).unwrap();
        assert_eq!(e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite), "\"num\" > 10");
    }

    #[test]
    fn eq_null_compiles_to_is_null() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let e = b.parse_query(&QueryExpr::eq("text", Value::Null)).unwrap();
        assert_eq!(e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite), "\"text\" IS NULL");
    }

    #[test]
    fn bits_all_set_compiles_to_mask_equality() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::field("num", vec![FieldQuery::BitsAllSet(5)]);
        let e = b.parse_query(&q).unwrap();
        assert_eq!(
            e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite),
            "\"num\" & 5 = 5"
        );
    }

    #[test]
    fn json_path_accessor_uses_json_extract() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let e = b.parse_query(&QueryExpr::eq("meta.a.b", 1i64)).unwrap();
        assert!(e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite).contains("JSON_EXTRACT"));
    }

    #[test]
    fn json_path_accessor_rejects_non_json_field() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        assert!(b.parse_query(&QueryExpr::eq("text.nested", 1i64)).is_err());
    }

    #[test]
    fn el_rejects_non_scalar_match_value() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::field("tags", vec![FieldQuery::El(Value::List(vec![]))]);
        assert!(b.parse_query(&q).is_err());
    }

    #[test]
    fn size_compiles_to_comma_count_formula() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::field("tags", vec![FieldQuery::Size(3)]);
        let e = b.parse_query(&q).unwrap();
        let sql = e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite);
        assert!(sql.contains("IIF"));
        assert!(sql.ends_with("= 3"));
    }

    #[test]
    fn length_on_json_field_uses_dialect_function() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let e = b.parse_eval(&EvalExpr::Length(Box::new(EvalExpr::path("meta")))).unwrap();
        assert!(e
            .to_tokens_for_dialect(Dialect::Sqlite)
            .serialize(Dialect::Sqlite)
            .contains("JSON_ARRAY_LENGTH"));

        let e = b.parse_eval(&EvalExpr::Length(Box::new(EvalExpr::path("meta")))).unwrap();
        assert!(e.to_tokens_for_dialect(Dialect::MySql).serialize(Dialect::MySql).contains("JSON_LENGTH"));
    }

    #[test]
    fn length_on_list_field_uses_comma_count() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let e = b.parse_eval(&EvalExpr::Length(Box::new(EvalExpr::path("tags")))).unwrap();
        assert!(e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite).contains("IIF"));
    }

    #[test]
    fn concat_dispatches_through_dialect_fallback() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::MySql);
        let e = b
            .parse_eval(&EvalExpr::Concat(vec![EvalExpr::path("text"), EvalExpr::lit("!")]))
            .unwrap();
        assert_eq!(e.to_tokens_for_dialect(Dialect::MySql).serialize(Dialect::MySql), "CONCAT(`text`, '!')");
    }

    #[test]
    fn sum_over_list_field_expands_elements() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let e = b.parse_eval(&EvalExpr::Sum(Box::new(EvalExpr::path("tags")))).unwrap();
        let sql = e.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite);
        assert!(sql.contains("json_each"));
    }

    #[test]
    fn compile_get_returns_none_for_always_false_filter() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let q = QueryExpr::field("id", vec![FieldQuery::In(vec![])]);
        assert!(b.compile_get("bar", &q, None, &[], None, None).unwrap().is_none());
    }

    #[test]
    fn compile_set_replaces_plain_column_wholesale() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let updates = vec![("num".to_string(), EvalExpr::Add(vec![EvalExpr::path("num"), EvalExpr::lit(1i64)]))];
        let compiled = b.compile_set(&updates).unwrap();
        assert_eq!(compiled[0].0, "num");
        assert_eq!(compiled[0].1.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite), "\"num\" + 1");
    }

    #[test]
    fn compile_set_merges_dotted_json_path() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let updates = vec![("meta.a".to_string(), EvalExpr::lit(1i64))];
        let compiled = b.compile_set(&updates).unwrap();
        assert_eq!(compiled[0].0, "meta");
        let sql = compiled[0].1.to_tokens_for_dialect(Dialect::Sqlite).serialize(Dialect::Sqlite);
        assert!(sql.to_lowercase().contains("json_set"));
    }

    #[test]
    fn compile_get_builds_select_with_projection_and_sort() {
        let m = bar_model();
        let b = QueryBuilder::new(&m, Dialect::Sqlite);
        let fields = vec![("n".to_string(), EvalExpr::path("num"))];
        let query = b
            .compile_get("bar", &QueryExpr::all(), Some(&fields), &[(EvalExpr::path("id"), true)], Some(5), None)
            .unwrap()
            .unwrap();
        let sql = query.to_sql(Dialect::Sqlite);
        assert!(sql.starts_with("SELECT \"num\" AS \"n\" FROM \"bar\""));
        assert!(sql.contains("ORDER BY \"id\" ASC"));
        assert!(sql.contains("LIMIT 5"));
    }
}
