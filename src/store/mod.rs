/// Hierarchical key-value state store.
///
/// Paths are dot-separated (`stations.wien_nord.trend.short`). Objects are
/// either channels (grouping nodes, no value) or states (typed leaves with a
/// display role). The reconciler only ever talks to the `StateStore` trait;
/// `MemoryStore` backs tests and dry runs, `PgStore` backs production.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Object definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Channel,
    State,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Channel => "channel",
            ObjectKind::State => "state",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Number => write!(f, "number"),
            ValueType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Semantic role tag consumers use to pick a widget for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "indicator")]
    Indicator,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "level")]
    Level,
    #[serde(rename = "value.gps.latitude")]
    GpsLatitude,
    #[serde(rename = "value.gps.longitude")]
    GpsLongitude,
    #[serde(rename = "value.gps.elevation")]
    GpsElevation,
}

/// Definition of one object in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectSpec {
    Channel {
        name: String,
    },
    State {
        name: String,
        value_type: ValueType,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
}

impl ObjectSpec {
    pub fn channel(name: &str) -> Self {
        ObjectSpec::Channel { name: name.to_string() }
    }

    pub fn state(name: &str, value_type: ValueType, role: Role) -> Self {
        ObjectSpec::State {
            name: name.to_string(),
            value_type,
            role,
            unit: None,
        }
    }

    pub fn with_unit(self, unit: &str) -> Self {
        match self {
            ObjectSpec::State { name, value_type, role, .. } => ObjectSpec::State {
                name,
                value_type,
                role,
                unit: Some(unit.to_string()),
            },
            channel => channel,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectSpec::Channel { .. } => ObjectKind::Channel,
            ObjectSpec::State { .. } => ObjectKind::State,
        }
    }

    /// Declared value type; channels hold no value.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            ObjectSpec::Channel { .. } => None,
            ObjectSpec::State { value_type, .. } => Some(*value_type),
        }
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            StateValue::Bool(_) => ValueType::Boolean,
            StateValue::Number(_) => ValueType::Number,
            StateValue::Text(_) => ValueType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No object defined at '{0}'")]
    UnknownPath(String),
    #[error("'{path}' is a channel and holds no value")]
    NotAState { path: String },
    #[error("'{path}' expects a {expected} value, got {actual}")]
    TypeMismatch {
        path: String,
        expected: ValueType,
        actual: ValueType,
    },
    #[error("Database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("Stored JSON could not be decoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Checks a value against an object definition before it is written.
pub(crate) fn check_writable(path: &str, spec: &ObjectSpec, value: &StateValue) -> Result<(), StoreError> {
    let expected = spec.value_type().ok_or_else(|| StoreError::NotAState {
        path: path.to_string(),
    })?;
    let actual = value.value_type();
    if expected != actual {
        return Err(StoreError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// True when `path` lies strictly below `prefix`.
pub(crate) fn is_descendant(path: &str, prefix: &str) -> bool {
    path.len() > prefix.len() + 1
        && path.starts_with(prefix)
        && path.as_bytes()[prefix.len()] == b'.'
}

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

/// Operations the service needs from the host state tree.
///
/// Methods take `&mut self` because the PostgreSQL client requires it.
pub trait StateStore {
    /// Creates the object if absent. Never alters an existing definition.
    /// Returns `true` when the object was created.
    fn ensure_exists(&mut self, path: &str, spec: &ObjectSpec) -> Result<bool, StoreError>;

    /// Overwrites the value of an existing state.
    fn write(&mut self, path: &str, value: StateValue) -> Result<(), StoreError>;

    fn read(&mut self, path: &str) -> Result<Option<StateValue>, StoreError>;

    /// Removes `path`; with `recursive` also every descendant. Returns the
    /// number of objects removed. Absent paths are not an error.
    fn delete(&mut self, path: &str, recursive: bool) -> Result<usize, StoreError>;

    /// Strict descendants of `prefix` with the given kind, sorted.
    fn list_where(&mut self, prefix: &str, kind: ObjectKind) -> Result<Vec<String>, StoreError>;
}
