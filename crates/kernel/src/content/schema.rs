//! Field schemas shared by section and block type definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FieldErrors;

/// Input widget / value kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Richtext,
    Number,
    Boolean,
    Select,
    Color,
    Url,
    Image,
    Code,
    /// A list of nested objects (slides, gallery images, FAQ items, …).
    Repeater,
}

/// Schema for one field of a section or block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldSchema {
    /// A field of the given kind with no default and no options.
    pub fn new(kind: FieldKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
            required: false,
            default: None,
            options: Vec::new(),
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Set the allowed options (select fields).
    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Ordered field-name → schema map.
pub type Schema = BTreeMap<String, FieldSchema>;

/// Build a schema from `(name, field)` pairs.
pub fn schema(fields: Vec<(&str, FieldSchema)>) -> Schema {
    fields
        .into_iter()
        .map(|(name, field)| (name.to_string(), field))
        .collect()
}

/// Collect the declared defaults of a schema into a data object.
pub fn defaults_of(schema: &Schema) -> Map<String, Value> {
    schema
        .iter()
        .filter_map(|(name, field)| field.default.clone().map(|v| (name.clone(), v)))
        .collect()
}

/// Check required fields only. Keys of the returned map are prefixed with
/// `prefix` (e.g. `blocks.2.`) so nested callers can report precise paths.
pub fn validate_required(schema: &Schema, data: &Map<String, Value>, prefix: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for (name, field) in schema {
        if !field.required {
            continue;
        }
        if is_blank(data.get(name)) {
            errors.insert(
                format!("{prefix}{name}"),
                format!("The {} field is required.", field.label),
            );
        }
    }

    errors
}

/// A value counts as missing when absent, null, an empty/whitespace string,
/// or an empty array.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
