//! Values flowing through handlers, variables and the model gateway.

use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::identity::{ResolutionId, SlotId};
use crate::model::ObjectId;

/// A value produced by a handler or stored in the variable environment.
///
/// `Pending` is the forward-reference token: it stands for an object that has
/// been demanded by id (or promised through a forward-declaration slot) but
/// not yet created. Pending values must be consumed through
/// [`crate::context::ExecutionContext::deref`]; they never reach the model
/// gateway.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(ObjectId),
    Pending(PendingRef),
}

/// Which unresolved identity a pending value points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRef {
    /// An id-based resolution in the identity registry.
    Id(ResolutionId),
    /// A forward-declaration slot.
    Slot(SlotId),
}

impl Value {
    /// Whether this value is still awaiting resolution.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending(_))
    }

    /// Whether this value is the null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The object id, if this value is a concrete object.
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Render the value as plain text for predicate comparison.
    ///
    /// Null renders as the empty string; objects render as `@index`.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::as_text)
                .collect::<Vec<_>>()
                .join(" "),
            Value::Object(id) => format!("@{id}"),
            Value::Pending(_) => "<pending>".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// Serialization is only used for the model dump; pending values never
// survive into the model, but the impl stays total anyway.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(id) => serializer.serialize_str(&format!("@{id}")),
            Value::Pending(_) => serializer.serialize_str("<pending>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_text() {
        assert_eq!(Value::Null.as_text(), "");
        assert_eq!(Value::Bool(true).as_text(), "true");
        assert_eq!(Value::Int(-3).as_text(), "-3");
        assert_eq!(Value::Str("abc".into()).as_text(), "abc");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).as_text(),
            "1 2"
        );
    }

    #[test]
    fn test_pending_is_pending() {
        let v = Value::Pending(PendingRef::Id(ResolutionId::new(0)));
        assert!(v.is_pending());
        assert!(v.as_object().is_none());
    }

    #[test]
    fn test_object_accessor() {
        let v = Value::Object(ObjectId::new(4));
        assert_eq!(v.as_object(), Some(ObjectId::new(4)));
        assert_eq!(v.as_text(), "@4");
    }
}
