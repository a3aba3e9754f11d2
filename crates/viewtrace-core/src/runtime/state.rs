/*!
# Reactive State Capabilities

The interface the harness uses to drive a live view: read a field, write a field, and
let the host settle. Replaces reflection over the view's storage.
*/

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instrument::Mutation;

use super::host::HostError;

/// Value of one reactive field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "Bool",
            FieldValue::Int(_) => "Int",
            FieldValue::Float(_) => "Double",
            FieldValue::Text(_) => "String",
        }
    }

    /// Zero value for a declared type, when the type is one the harness can drive
    pub fn default_for(declared_type: &str) -> Option<Self> {
        match declared_type.trim() {
            "Int" => Some(FieldValue::Int(0)),
            "Double" | "Float" => Some(FieldValue::Float(0.0)),
            "Bool" => Some(FieldValue::Bool(false)),
            "String" => Some(FieldValue::Text(String::new())),
            _ => None,
        }
    }

    /// Convert to the declared type of the field it initializes: an integer literal
    /// seeds a `Double` field. `None` when the value cannot hold that type; an
    /// undeclared or non-scalar type keeps the value as is.
    pub fn conform_to(self, declared_type: Option<&str>) -> Option<Self> {
        let Some(expected) = declared_type.and_then(FieldValue::default_for) else {
            return Some(self);
        };
        match (expected, self) {
            (FieldValue::Float(_), FieldValue::Int(n)) => Some(FieldValue::Float(n as f64)),
            (expected, value) if expected.same_type(&value) => Some(value),
            _ => None,
        }
    }

    pub fn same_type(&self, other: &FieldValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Type mismatch for field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Field-level read/write access to a view's reactive state
pub trait ReactiveState {
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Request a change; hosts may defer applying it until [`LiveHost::settle`]
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), StateError>;
}

/// A mounted view whose re-renders can be waited for
pub trait LiveHost: ReactiveState {
    /// Wait `wait` for pending changes to propagate
    fn settle(&mut self, wait: Duration) -> Result<(), HostError>;
}

impl Mutation {
    /// The value this mutation produces from `current`, or `None` when the mutation
    /// does not apply to that kind of value
    pub fn apply(&self, current: &FieldValue) -> Option<FieldValue> {
        match (self, current) {
            (Mutation::Increment, FieldValue::Int(n)) => Some(FieldValue::Int(n.wrapping_add(1))),
            (Mutation::IncrementFloat, FieldValue::Float(x)) => Some(FieldValue::Float(x + 1.0)),
            (Mutation::Toggle, FieldValue::Bool(b)) => Some(FieldValue::Bool(!b)),
            (Mutation::Append(suffix), FieldValue::Text(s)) => {
                Some(FieldValue::Text(format!("{s}{suffix}")))
            }
            _ => None,
        }
    }
}
