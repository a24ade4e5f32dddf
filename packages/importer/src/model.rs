//! Model gateway boundary: the object graph the import populates.
//!
//! The engine itself never owns domain objects. It talks to a
//! [`ModelGateway`] which creates typed objects and reads/writes their
//! properties and references. [`InMemoryModel`] is the gateway used by the
//! CLI and the test suite; persisted models implement the same trait.
//!
//! The gateway is resolution-agnostic: handlers dereference pending forward
//! references before calling it, so every value it sees is concrete.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::value::Value;

/// Opaque handle to an object created through a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Create an object id from a raw index.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw index of this id.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Create/read/write access to the object graph being populated.
///
/// Contract: `set_property` is last-write-wins and may be called repeatedly
/// for the same property; any previously returned [`ObjectId`] stays valid
/// for the lifetime of the gateway.
pub trait ModelGateway {
    /// Create a new object of the given type, tagged with its external id.
    fn create_object(&mut self, type_name: &str, external_id: &str) -> ObjectId;

    /// Record an additional external id for an existing object.
    fn assign_alternate_id(&mut self, obj: ObjectId, external_id: &str);

    /// Write a named property. Last write wins.
    fn set_property(&mut self, obj: ObjectId, name: &str, value: Value);

    /// Read a named property back, if set.
    fn property(&self, obj: ObjectId, name: &str) -> Option<&Value>;

    /// Replace a named reference with the given targets.
    fn set_reference(&mut self, obj: ObjectId, name: &str, targets: Vec<ObjectId>);

    /// Append one target to a named reference collection.
    fn append_reference(&mut self, obj: ObjectId, name: &str, target: ObjectId);

    /// Read a named reference back, if set.
    fn reference(&self, obj: ObjectId, name: &str) -> Option<&[ObjectId]>;
}

/// One object held by the in-memory model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelObject {
    #[serde(rename = "type")]
    pub type_name: String,
    pub external_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternate_ids: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<ObjectId>>,
}

/// Simple in-memory object graph.
#[derive(Debug, Default, Serialize)]
pub struct InMemoryModel {
    objects: Vec<ModelObject>,
}

impl InMemoryModel {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects in the model.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the model holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Look up an object by id.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&ModelObject> {
        self.objects.get(id.index())
    }

    /// Find the first object carrying the given external or alternate id.
    #[must_use]
    pub fn find_by_external_id(&self, external_id: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .position(|o| {
                o.external_id == external_id || o.alternate_ids.iter().any(|a| a == external_id)
            })
            .map(ObjectId::new)
    }

    /// Iterate over all objects with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ModelObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectId::new(i), o))
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut ModelObject> {
        let slot = self.objects.get_mut(id.index());
        if slot.is_none() {
            tracing::warn!(id = id.index(), "Unknown object id passed to model");
        }
        slot
    }
}

impl ModelGateway for InMemoryModel {
    fn create_object(&mut self, type_name: &str, external_id: &str) -> ObjectId {
        let id = ObjectId::new(self.objects.len());
        self.objects.push(ModelObject {
            type_name: type_name.to_string(),
            external_id: external_id.to_string(),
            ..ModelObject::default()
        });
        tracing::debug!(%id, type_name, external_id, "Created object");
        id
    }

    fn assign_alternate_id(&mut self, obj: ObjectId, external_id: &str) {
        if let Some(o) = self.object_mut(obj) {
            o.alternate_ids.push(external_id.to_string());
        }
    }

    fn set_property(&mut self, obj: ObjectId, name: &str, value: Value) {
        if let Some(o) = self.object_mut(obj) {
            o.properties.insert(name.to_string(), value);
        }
    }

    fn property(&self, obj: ObjectId, name: &str) -> Option<&Value> {
        self.object(obj).and_then(|o| o.properties.get(name))
    }

    fn set_reference(&mut self, obj: ObjectId, name: &str, targets: Vec<ObjectId>) {
        if let Some(o) = self.object_mut(obj) {
            o.references.insert(name.to_string(), targets);
        }
    }

    fn append_reference(&mut self, obj: ObjectId, name: &str, target: ObjectId) {
        if let Some(o) = self.object_mut(obj) {
            o.references.entry(name.to_string()).or_default().push(target);
        }
    }

    fn reference(&self, obj: ObjectId, name: &str) -> Option<&[ObjectId]> {
        self.object(obj)
            .and_then(|o| o.references.get(name))
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_read_back() {
        let mut model = InMemoryModel::new();
        let a = model.create_object("Book", "b1");
        model.set_property(a, "title", Value::Str("Dune".into()));

        assert_eq!(model.len(), 1);
        assert_eq!(model.property(a, "title"), Some(&Value::Str("Dune".into())));
        assert_eq!(model.property(a, "missing"), None);
    }

    #[test]
    fn test_set_property_last_write_wins() {
        let mut model = InMemoryModel::new();
        let a = model.create_object("Book", "b1");
        model.set_property(a, "title", Value::Str("first".into()));
        model.set_property(a, "title", Value::Str("second".into()));

        assert_eq!(
            model.property(a, "title"),
            Some(&Value::Str("second".into()))
        );
    }

    #[test]
    fn test_references_set_and_append() {
        let mut model = InMemoryModel::new();
        let a = model.create_object("Book", "b1");
        let b = model.create_object("Author", "a1");
        let c = model.create_object("Author", "a2");

        model.set_reference(a, "authors", vec![b]);
        model.append_reference(a, "authors", c);

        assert_eq!(model.reference(a, "authors"), Some(&[b, c][..]));
        assert_eq!(model.reference(a, "translators"), None);
    }

    #[test]
    fn test_find_by_external_or_alternate_id() {
        let mut model = InMemoryModel::new();
        let a = model.create_object("Book", "b1");
        model.assign_alternate_id(a, "isbn-42");

        assert_eq!(model.find_by_external_id("b1"), Some(a));
        assert_eq!(model.find_by_external_id("isbn-42"), Some(a));
        assert_eq!(model.find_by_external_id("nope"), None);
    }
}
