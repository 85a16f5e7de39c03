//! Schema synchronizer (§4.5): reconciles a live table's columns against
//! its declared [`Model`], producing the DDL needed to converge without
//! ever losing data the model still wants.
//!
//! [`Synchronizer::plan`] is pure — it never touches a connection. A driver
//! introspects its own live columns (`PRAGMA table_info` on SQLite,
//! `INFORMATION_SCHEMA.COLUMNS` on MySQL), builds a [`LiveColumn`] list, and
//! executes whatever [`MigrationPlan::statements`] comes back, in order.

use crate::error::{Error, Result};
use crate::field::{Field, FieldType};
use crate::model::Model;
use crate::sql::ddl::{AlterTable, ColumnDef, CreateTable, DropTable};
use crate::sql::dialect::{Dialect, SqlDialect};

/// One column as reported by the live database. Only the name is needed to
/// drive matching — the synchronizer never tries to parse a live SQL type
/// back into a [`FieldType`]; a changed type is just another mismatch the
/// rebuild path clears up by recreating the column from the declared model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What `prepare` needs to run to bring one table's schema in line with its
/// model, as SQL statement strings in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub statements: Vec<String>,
    /// True when the table was already synchronized and nothing changed —
    /// the idempotent no-DDL case (§4.5's "second call... issues no DDL").
    pub is_noop: bool,
    /// Set only for a SQLite rebuild: the `CREATE TABLE ... _temp` name, so
    /// the driver can `DROP TABLE IF EXISTS` it if the `INSERT INTO ...
    /// SELECT` step fails partway (§4.5 step 5's failure handling).
    pub rebuild_temp_table: Option<String>,
}

pub struct Synchronizer;

impl Synchronizer {
    /// Build the plan for bringing `table`'s live columns in line with
    /// `model`, per §4.5 steps 1-6.
    pub fn plan(model: &Model, dialect: Dialect, live: &[LiveColumn]) -> Result<MigrationPlan> {
        let declared = declared_columns(model, dialect)?;

        // Step 4: no live columns at all -> CREATE TABLE from scratch.
        if live.is_empty() {
            let create = CreateTable::new(&model.name).if_not_exists().columns(declared);
            return Ok(MigrationPlan { statements: vec![create.to_sql(dialect)], is_noop: false, rebuild_temp_table: None });
        }

        // Step 3: match each declared field to a live column by name or
        // legacy alias.
        let mut matched: Vec<(String, String)> = Vec::new(); // (live_name, declared_name)
        let mut missing: Vec<&Field> = Vec::new();
        for field in model.active_fields() {
            match live.iter().find(|c| field.matches_live_name(&c.name)) {
                Some(live_col) => matched.push((live_col.name.clone(), field.name.clone())),
                None => missing.push(field),
            }
        }

        let needs_rename = matched.iter().any(|(live_name, declared_name)| live_name != declared_name);

        if needs_rename {
            return match dialect {
                // SQLite: full copy-rename-migrate dance (§4.5 step 5).
                Dialect::Sqlite => {
                    let temp = format!("{}_temp", model.name);
                    let statements = migrate_via_rebuild(model, dialect, &declared, &temp, &matched)?;
                    Ok(MigrationPlan { statements, is_noop: false, rebuild_temp_table: Some(temp) })
                }
                // MySQL: native `RENAME COLUMN` alongside any `ADD COLUMN`s,
                // in one additive `ALTER TABLE` (§4.5 step 6).
                Dialect::MySql => {
                    let mut alter = AlterTable::new(&model.name);
                    for (live_name, declared_name) in &matched {
                        if live_name != declared_name {
                            alter = alter.rename_column(live_name.clone(), declared_name.clone());
                        }
                    }
                    for field in &missing {
                        alter = alter.add_column(declared_column_for(&model.name, field, dialect)?);
                    }
                    Ok(MigrationPlan { statements: vec![alter.to_sql(dialect)], is_noop: false, rebuild_temp_table: None })
                }
            };
        }

        // Step 3 (continued): every matched column already has its declared
        // name; only genuinely new fields need columns.
        if missing.is_empty() {
            return Ok(MigrationPlan { statements: Vec::new(), is_noop: true, rebuild_temp_table: None });
        }

        let mut alter = AlterTable::new(&model.name);
        for field in &missing {
            alter = alter.add_column(declared_column_for(&model.name, field, dialect)?);
        }
        Ok(MigrationPlan { statements: vec![alter.to_sql(dialect)], is_noop: false, rebuild_temp_table: None })
    }

    /// Build the statement for dropping columns a migration hook returned
    /// as safe to remove (§4.5 step 7). `None` when the list is empty.
    pub fn drop_columns_statement(table: &str, columns: &[String], dialect: Dialect) -> Option<String> {
        if columns.is_empty() {
            return None;
        }
        let actions = columns
            .iter()
            .map(|c| format!("DROP COLUMN {}", dialect.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("ALTER TABLE {} {}", dialect.quote_identifier(table), actions))
    }
}

fn declared_columns(model: &Model, dialect: Dialect) -> Result<Vec<ColumnDef>> {
    model.active_fields().map(|f| declared_column_for(&model.name, f, dialect)).collect()
}

/// Build one declared `ColumnDef`, validating that the field's type is
/// actually mappable — a `schema-mismatch` is fatal at `prepare` time (§7).
fn declared_column_for(table: &str, field: &Field, dialect: Dialect) -> Result<ColumnDef> {
    if field.ty == FieldType::Decimal && (field.precision.is_none() || field.scale.is_none()) {
        return Err(Error::schema_mismatch(table, &field.name, "decimal field requires precision and scale"));
    }

    let mut col = ColumnDef::from_field(field);
    if col.primary_key {
        return Ok(col);
    }
    if !field.nullable {
        col = col.not_null();
    }
    if let Some(initial) = &field.initial {
        col = col.default(crate::escape::escape_value(dialect, initial));
    }
    Ok(col)
}

/// SQLite's copy-rename-migrate dance: build a `_temp` table with the
/// declared shape, copy every row across mapping live names to declared
/// ones, drop the original, rename `_temp` into its place. A field with no
/// live counterpart (a rename paired with a brand-new column) is simply
/// left out of the copy and picks up its column default instead.
fn migrate_via_rebuild(
    model: &Model,
    dialect: Dialect,
    declared: &[ColumnDef],
    temp: &str,
    matched: &[(String, String)],
) -> Result<Vec<String>> {
    let create_temp = CreateTable::new(temp).columns(declared.to_vec());

    let mut insert_cols = Vec::new();
    let mut select_cols = Vec::new();
    for field in model.active_fields() {
        if let Some((live_name, _)) = matched.iter().find(|(_, declared_name)| declared_name == &field.name) {
            insert_cols.push(dialect.quote_identifier(&field.name));
            select_cols.push(dialect.quote_identifier(live_name));
        }
    }

    let insert_sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        dialect.quote_identifier(temp),
        insert_cols.join(", "),
        select_cols.join(", "),
        dialect.quote_identifier(&model.name),
    );

    Ok(vec![
        create_temp.to_sql(dialect),
        insert_sql,
        DropTable::new(&model.name).to_sql(dialect),
        format!("ALTER TABLE {} RENAME TO {}", dialect.quote_identifier(temp), dialect.quote_identifier(&model.name)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use crate::model::Model;

    fn bar_model() -> Model {
        Model::new(
            "bar",
            vec![
                Field::new("id", FieldType::Primary),
                Field::new("text", FieldType::String).legacy("caption"),
                Field::new("num", FieldType::Integer),
            ],
        )
        .unwrap()
    }

    #[test]
    fn no_live_columns_creates_table() {
        let m = bar_model();
        let plan = Synchronizer::plan(&m, Dialect::Sqlite, &[]).unwrap();
        assert!(plan.statements[0].starts_with("CREATE TABLE IF NOT EXISTS \"bar\""));
        assert!(!plan.is_noop);
    }

    #[test]
    fn fully_matched_schema_is_noop() {
        let m = bar_model();
        let live = vec![LiveColumn::new("id"), LiveColumn::new("text"), LiveColumn::new("num")];
        let plan = Synchronizer::plan(&m, Dialect::Sqlite, &live).unwrap();
        assert!(plan.is_noop);
        assert!(plan.statements.is_empty());
    }

    #[test]
    fn missing_field_adds_column() {
        let m = bar_model();
        let live = vec![LiveColumn::new("id"), LiveColumn::new("text")];
        let plan = Synchronizer::plan(&m, Dialect::Sqlite, &live).unwrap();
        assert_eq!(plan.statements.len(), 1);
        assert!(plan.statements[0].contains("ADD COLUMN \"num\""));
    }

    #[test]
    fn legacy_alias_triggers_sqlite_rebuild() {
        let m = bar_model();
        let live = vec![LiveColumn::new("id"), LiveColumn::new("caption"), LiveColumn::new("num")];
        let plan = Synchronizer::plan(&m, Dialect::Sqlite, &live).unwrap();
        assert!(plan.rebuild_temp_table.is_some());
        assert_eq!(plan.statements.len(), 4);
        assert!(plan.statements[1].contains("\"caption\""));
        assert!(plan.statements[1].contains("\"text\""));
    }

    #[test]
    fn legacy_alias_on_mysql_renames_in_place() {
        let m = bar_model();
        let live = vec![LiveColumn::new("id"), LiveColumn::new("caption"), LiveColumn::new("num")];
        let plan = Synchronizer::plan(&m, Dialect::MySql, &live).unwrap();
        assert!(plan.rebuild_temp_table.is_none());
        assert_eq!(plan.statements.len(), 1);
        assert!(plan.statements[0].contains("RENAME COLUMN"));
    }

    #[test]
    fn decimal_field_without_precision_is_schema_mismatch() {
        let m = Model::new("t", vec![Field::new("id", FieldType::Primary), Field::new("amount", FieldType::Decimal)])
            .unwrap();
        assert!(Synchronizer::plan(&m, Dialect::Sqlite, &[]).is_err());
    }

    #[test]
    fn drop_columns_statement_builds_alter() {
        let sql = Synchronizer::drop_columns_statement("bar", &["old".to_string()], Dialect::MySql).unwrap();
        assert_eq!(sql, "ALTER TABLE `bar` DROP COLUMN `old`");
        assert!(Synchronizer::drop_columns_statement("bar", &[], Dialect::MySql).is_none());
    }
}
