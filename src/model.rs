//! Declared table models and the in-memory registry that holds them.
//!
//! A [`Model`] is the single source of truth the schema synchronizer
//! (§4.5, see [`crate::schema`]) reconciles live tables against, and that
//! the [`Caster`](crate::caster::Caster) consults when marshalling values.
//! It names nothing SQL-specific — a `Model` knows fields, keys, and
//! migration hooks, not column types or dialects.

use std::collections::HashMap;

use thiserror::Error;

use crate::field::{Field, FieldType};

/// Errors raised while declaring or validating a [`Model`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model `{0}` declares no fields")]
    NoFields(String),

    #[error("model `{table}` has no primary key field")]
    MissingPrimaryKey { table: String },

    #[error("model `{table}` requires auto-increment to be disabled for a composite primary key ({fields:?})")]
    AutoIncrementRequiresScalarPrimary { table: String, fields: Vec<String> },

    #[error("model `{table}` declares field `{field}` twice")]
    DuplicateField { table: String, field: String },

    #[error("model `{table}` unique group references unknown field `{field}`")]
    UnknownUniqueField { table: String, field: String },

    #[error("model `{table}` foreign key on `{field}` references unknown local field")]
    UnknownForeignKeyField { table: String, field: String },
}

/// A migration hook, invoked by the synchronizer once a table's column set
/// has been brought into shape for one pass. `before`/`after` run around the
/// point where new columns are usable; `finalize` runs once the table is
/// fully settled. Any hook may return column names that are now safe to
/// drop, accumulated across all hooks and fed back into the next
/// `prepare` pass (§4.5 step 7).
pub struct MigrationHooks {
    pub before: Option<Box<dyn Fn() -> Vec<String> + Send + Sync>>,
    pub after: Option<Box<dyn Fn() -> Vec<String> + Send + Sync>>,
    pub finalize: Option<Box<dyn Fn() -> Vec<String> + Send + Sync>>,
}

impl std::fmt::Debug for MigrationHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

impl Default for MigrationHooks {
    fn default() -> Self {
        Self { before: None, after: None, finalize: None }
    }
}

/// A foreign key reference: `field` in this table points at
/// `referenced_table.referenced_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: String,
    pub referenced_table: String,
    pub referenced_field: String,
}

/// A declared table: its fields, in declaration order, plus the
/// constraints the synchronizer and caster need to know about.
#[derive(Debug, Default)]
pub struct Model {
    pub name: String,
    fields: Vec<Field>,
    /// Declared field name -> index into `fields`, for O(1) lookup.
    index: HashMap<String, usize>,
    /// Groups of field names that must be jointly unique.
    pub unique_groups: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKey>,
    pub hooks: Option<MigrationHooks>,
    /// Declared primary field names, in declaration order. A single entry
    /// is the common scalar-primary case; more than one is a composite
    /// primary key, which forces `auto_inc` to `false`.
    primary_fields: Vec<String>,
    auto_inc: bool,
    format: Option<crate::caster::FormatHook>,
    parse: Option<crate::caster::ParseHook>,
}

impl Model {
    /// Build and validate a model from its declared fields.
    ///
    /// Validates: at least one field, at least one `Primary`-typed field, no
    /// duplicate names, and that unique groups / foreign keys only
    /// reference fields that exist. `primary` may be a single field (scalar,
    /// defaults to auto-increment) or an ordered list of fields (composite,
    /// never auto-increment — see [`Model::auto_increment`]).
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self, ModelError> {
        let name = name.into();
        if fields.is_empty() {
            return Err(ModelError::NoFields(name));
        }

        let mut index = HashMap::with_capacity(fields.len());
        let mut primary_fields = Vec::new();
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateField { table: name, field: field.name.clone() });
            }
            if field.ty == FieldType::Primary {
                primary_fields.push(field.name.clone());
            }
        }
        if primary_fields.is_empty() {
            return Err(ModelError::MissingPrimaryKey { table: name });
        }

        let auto_inc = primary_fields.len() == 1;
        Ok(Model {
            name,
            fields,
            index,
            unique_groups: Vec::new(),
            foreign_keys: Vec::new(),
            hooks: None,
            primary_fields,
            auto_inc,
            format: None,
            parse: None,
        })
    }

    /// Override the default auto-increment inference. `true` requires a
    /// scalar (single-field) primary key; `false` is always accepted, and
    /// is the only legal value for a composite primary key (§3's "autoInc
    /// ... only constrained to require a scalar primary when true").
    pub fn auto_increment(mut self, auto_inc: bool) -> Result<Self, ModelError> {
        if auto_inc && self.primary_fields.len() != 1 {
            return Err(ModelError::AutoIncrementRequiresScalarPrimary {
                table: self.name,
                fields: self.primary_fields,
            });
        }
        self.auto_inc = auto_inc;
        Ok(self)
    }

    /// Install the model-level `format`/`parse` hooks the caster runs a
    /// whole object through on `dump`/`load`, in addition to the per-field
    /// plugin conversions (§4.2).
    pub fn format_hook(mut self, hook: crate::caster::FormatHook) -> Self {
        self.format = Some(hook);
        self
    }

    pub fn parse_hook(mut self, hook: crate::caster::ParseHook) -> Self {
        self.parse = Some(hook);
        self
    }

    pub(crate) fn format(&self) -> Option<&crate::caster::FormatHook> {
        self.format.as_ref()
    }

    pub(crate) fn parse(&self) -> Option<&crate::caster::ParseHook> {
        self.parse.as_ref()
    }

    pub fn unique_group(mut self, fields: Vec<String>) -> Result<Self, ModelError> {
        for f in &fields {
            if !self.index.contains_key(f) {
                return Err(ModelError::UnknownUniqueField { table: self.name.clone(), field: f.clone() });
            }
        }
        self.unique_groups.push(fields);
        Ok(self)
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Result<Self, ModelError> {
        if !self.index.contains_key(&fk.field) {
            return Err(ModelError::UnknownForeignKeyField { table: self.name.clone(), field: fk.field });
        }
        self.foreign_keys.push(fk);
        Ok(self)
    }

    pub fn hooks(mut self, hooks: MigrationHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Declared fields that still get a column on CREATE/ALTER — everything
    /// except fields marked deprecated (§4.5 step 1).
    pub fn active_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.deprecated)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// The first declared `Primary`-typed field. Guaranteed present by
    /// `new`'s validation; for a composite primary key this is only one of
    /// several — prefer [`Model::primary_keys`] when more than one may be
    /// declared.
    pub fn primary_key(&self) -> &Field {
        self.fields
            .iter()
            .find(|f| f.ty == FieldType::Primary)
            .expect("Model::new guarantees at least one primary field")
    }

    /// All declared primary fields, in declaration order. One entry for a
    /// scalar primary key, more than one for a composite one.
    pub fn primary_keys(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.ty == FieldType::Primary)
    }

    pub fn is_composite_primary(&self) -> bool {
        self.primary_fields.len() > 1
    }

    /// Whether the primary key auto-increments. Defaults to `true` for a
    /// scalar primary and `false` for a composite one; overridable via
    /// [`Model::auto_increment`] subject to its scalar-primary constraint.
    pub fn is_auto_increment(&self) -> bool {
        self.auto_inc
    }
}

/// In-memory catalog of declared models, keyed by table name. Drivers hold
/// one registry and consult it at `prepare`/`get`/`create`/... time.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare or replace a table's model.
    pub fn register(&mut self, model: Model) {
        self.models.insert(model.name.clone(), model);
    }

    pub fn get(&self, table: &str) -> Option<&Model> {
        self.models.get(table)
    }

    pub fn remove(&mut self, table: &str) -> Option<Model> {
        self.models.remove(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_fields() -> Vec<Field> {
        vec![
            Field::new("id", FieldType::Primary),
            Field::new("text", FieldType::String).legacy("caption"),
            Field::new("num", FieldType::Integer),
        ]
    }

    #[test]
    fn builds_valid_model() {
        let m = Model::new("bar", bar_fields()).unwrap();
        assert_eq!(m.primary_key().name, "id");
        assert_eq!(m.fields().len(), 3);
        assert!(m.is_auto_increment());
        assert!(!m.is_composite_primary());
    }

    #[test]
    fn rejects_missing_primary_key() {
        let fields = vec![Field::new("name", FieldType::String)];
        assert_eq!(
            Model::new("t", fields).unwrap_err(),
            ModelError::MissingPrimaryKey { table: "t".into() }
        );
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let fields = vec![
            Field::new("id", FieldType::Primary),
            Field::new("id", FieldType::Integer),
        ];
        assert_eq!(
            Model::new("t", fields).unwrap_err(),
            ModelError::DuplicateField { table: "t".into(), field: "id".into() }
        );
    }

    #[test]
    fn composite_primary_fields_default_to_no_auto_increment() {
        let fields = vec![
            Field::new("id", FieldType::Primary),
            Field::new("id2", FieldType::Primary),
        ];
        let m = Model::new("t", fields).unwrap();
        assert_eq!(m.primary_keys().count(), 2);
        assert!(!m.is_auto_increment());
        assert!(m.is_composite_primary());
    }

    #[test]
    fn auto_increment_true_rejects_composite_primary() {
        let fields = vec![
            Field::new("id", FieldType::Primary),
            Field::new("id2", FieldType::Primary),
        ];
        let m = Model::new("t", fields).unwrap();
        assert!(matches!(
            m.auto_increment(true).unwrap_err(),
            ModelError::AutoIncrementRequiresScalarPrimary { .. }
        ));
    }

    #[test]
    fn scalar_primary_can_opt_out_of_auto_increment() {
        let m = Model::new("bar", bar_fields()).unwrap().auto_increment(false).unwrap();
        assert!(!m.is_auto_increment());
    }

    #[test]
    fn unique_group_rejects_unknown_field() {
        let m = Model::new("bar", bar_fields()).unwrap();
        assert_eq!(
            m.unique_group(vec!["ghost".into()]).unwrap_err(),
            ModelError::UnknownUniqueField { table: "bar".into(), field: "ghost".into() }
        );
    }

    #[test]
    fn active_fields_skips_deprecated() {
        let fields = vec![
            Field::new("id", FieldType::Primary),
            Field::new("old", FieldType::String).deprecated(),
        ];
        let m = Model::new("t", fields).unwrap();
        assert_eq!(m.active_fields().count(), 1);
    }

    #[test]
    fn registry_roundtrip() {
        let mut reg = ModelRegistry::new();
        reg.register(Model::new("bar", bar_fields()).unwrap());
        assert!(reg.get("bar").is_some());
        assert!(reg.get("missing").is_none());
        assert_eq!(reg.tables().count(), 1);
    }
}
