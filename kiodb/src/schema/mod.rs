use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of value categories a column can hold.
/// Matches the dynamic JSON categories the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Object,
}

impl ColumnType {
    /// Whether a JSON value conforms to this column type.
    /// Null conforms to every type -- a column whose default is null
    /// holds null until a value is supplied.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::String, Value::String(_)) => true,
            (ColumnType::Number, Value::Number(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Object => "object",
        }
    }
}

/// Human-readable category of a JSON value, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A typed, named, optionally-unique, optionally-defaulted field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
            default: Value::Null,
            unique: false,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// A partial edit applied to an existing column.
/// Fields left as None keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub unique: Option<bool>,
}

impl ColumnPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        ColumnPatch {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn set_default(default: Value) -> Self {
        ColumnPatch {
            default: Some(default),
            ..Default::default()
        }
    }
}
