//! Semantic field types and their descriptors.
//!
//! `FieldType` is the enumerated set of types a [`Model`](crate::model::Model)
//! field can declare. Each variant carries dialect-independent semantics;
//! mapping a variant to a concrete column type is the job of
//! [`crate::sql::dialect::SqlDialect::emit_data_type`].

use serde::{Deserialize, Serialize};

/// The enumerated set of semantic field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// Single-column primary key (implies integer storage).
    Primary,
    Boolean,
    Integer,
    Unsigned,
    Float,
    Double,
    Decimal,
    Char,
    String,
    Text,
    /// Comma-joined scalar list, stored as text.
    List,
    /// Arbitrary JSON value, stored as text/json.
    Json,
    Date,
    Time,
    Timestamp,
}

impl FieldType {
    /// Parse a type name, case-insensitively. Mirrors the type-name grammar
    /// a model declaration would use (`"string"`, `"unsigned"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "primary" => Some(FieldType::Primary),
            "boolean" | "bool" => Some(FieldType::Boolean),
            "integer" | "int" => Some(FieldType::Integer),
            "unsigned" => Some(FieldType::Unsigned),
            "float" => Some(FieldType::Float),
            "double" => Some(FieldType::Double),
            "decimal" => Some(FieldType::Decimal),
            "char" => Some(FieldType::Char),
            "string" => Some(FieldType::String),
            "text" => Some(FieldType::Text),
            "list" => Some(FieldType::List),
            "json" => Some(FieldType::Json),
            "date" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "timestamp" => Some(FieldType::Timestamp),
            _ => None,
        }
    }

    /// Whether this type is a string-like scalar (char/string/text, plus the
    /// textual storage types list/json are excluded — they have their own
    /// cast plugins).
    pub fn is_string_like(self) -> bool {
        matches!(self, FieldType::Char | FieldType::String | FieldType::Text)
    }

    /// Whether this type is a numeric scalar.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Primary
                | FieldType::Integer
                | FieldType::Unsigned
                | FieldType::Float
                | FieldType::Double
                | FieldType::Decimal
        )
    }

    /// Whether this type is one of the three date-like kinds.
    pub fn is_date_like(self) -> bool {
        matches!(self, FieldType::Date | FieldType::Time | FieldType::Timestamp)
    }

    pub fn is_json(self) -> bool {
        matches!(self, FieldType::Json)
    }

    pub fn is_list(self) -> bool {
        matches!(self, FieldType::List)
    }
}

/// A field declaration inside a [`Model`](crate::model::Model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    /// `char`/`string` length, in characters.
    pub length: Option<u32>,
    /// `decimal` precision (total digits).
    pub precision: Option<u8>,
    /// `decimal` scale (digits after the decimal point).
    pub scale: Option<u8>,
    pub nullable: bool,
    /// Value substituted for this field when absent from inserted data, and
    /// used by the caster to fill in an empty json/list column on load.
    pub initial: Option<crate::value::Value>,
    /// Older column names this field used to be declared under; the
    /// synchronizer renames rather than recreates when it finds one live.
    pub legacy: Vec<String>,
    /// Deprecated fields are skipped when building declared column
    /// definitions but still recognized when diffing live columns.
    pub deprecated: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            ty,
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            initial: None,
            legacy: Vec::new(),
            deprecated: false,
        }
    }

    pub fn length(mut self, n: u32) -> Self {
        self.length = Some(n);
        self
    }

    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn initial(mut self, v: crate::value::Value) -> Self {
        self.initial = Some(v);
        self
    }

    pub fn legacy(mut self, alias: impl Into<String>) -> Self {
        self.legacy.push(alias.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Whether a live column by this name matches this field: either the
    /// live name itself, or any declared legacy alias.
    pub fn matches_live_name(&self, live_name: &str) -> bool {
        self.name == live_name || self.legacy.iter().any(|a| a == live_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_types() {
        assert_eq!(FieldType::parse("string"), Some(FieldType::String));
        assert_eq!(FieldType::parse("UNSIGNED"), Some(FieldType::Unsigned));
        assert_eq!(FieldType::parse("timestamp"), Some(FieldType::Timestamp));
    }

    #[test]
    fn parse_unknown_type() {
        assert_eq!(FieldType::parse("enum"), None);
    }

    #[test]
    fn categorization() {
        assert!(FieldType::String.is_string_like());
        assert!(FieldType::Unsigned.is_numeric());
        assert!(FieldType::Date.is_date_like());
        assert!(FieldType::Json.is_json());
        assert!(FieldType::List.is_list());
        assert!(!FieldType::Json.is_string_like());
    }

    #[test]
    fn legacy_alias_match() {
        let f = Field::new("text", FieldType::String).legacy("caption");
        assert!(f.matches_live_name("text"));
        assert!(f.matches_live_name("caption"));
        assert!(!f.matches_live_name("body"));
    }
}
