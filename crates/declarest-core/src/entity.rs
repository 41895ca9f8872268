// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entity data model: JSON records keyed by a mandatory string `id`.
//!
//! All fields other than `id` are opaque to the storage layer. Field rules
//! (required, readonly, defaults) are enforced by the resource descriptor,
//! not here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An unordered set of named JSON field values.
pub type Fields = serde_json::Map<String, Value>;

/// A JSON-serializable record with a unique string `id`.
///
/// Entities round-trip through storage unchanged: the engine persists the
/// serialized object and never inspects anything but `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(pub Fields);

impl Entity {
    /// Build an entity from raw fields.
    pub fn new(fields: Fields) -> Self {
        Entity(fields)
    }

    /// The entity id, if one has been assigned.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Assign (or re-assert) the entity id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert("id".into(), Value::String(id.into()));
    }

    /// Look up a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Overlay `patch` onto this entity, field by field. Existing fields not
    /// named in the patch are untouched.
    pub fn apply(&mut self, patch: &Patch) {
        for (name, value) in patch.fields() {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Borrow the raw fields.
    pub fn fields(&self) -> &Fields {
        &self.0
    }

    /// Consume into raw fields.
    pub fn into_fields(self) -> Fields {
        self.0
    }
}

impl From<Fields> for Entity {
    fn from(fields: Fields) -> Self {
        Entity(fields)
    }
}

/// A validated partial update.
///
/// Produced by [`ResourceDescriptor::sanitize_patch`], which strips every
/// readonly field before the patch reaches storage. Handlers never merge an
/// untyped request body directly.
///
/// [`ResourceDescriptor::sanitize_patch`]: crate::descriptor::ResourceDescriptor::sanitize_patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Fields);

impl Patch {
    /// A patch over raw fields. Callers outside the descriptor layer should
    /// prefer `sanitize_patch`, which enforces readonly rules.
    pub fn from_fields(fields: Fields) -> Self {
        Patch(fields)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        match value {
            Value::Object(map) => Entity(map),
            _ => panic!("test entity must be an object"),
        }
    }

    #[test]
    fn id_accessor_reads_string_ids() {
        let e = entity(json!({"id": "e-1", "title": "x"}));
        assert_eq!(e.id(), Some("e-1"));
    }

    #[test]
    fn id_accessor_ignores_non_string_ids() {
        let e = entity(json!({"id": 42}));
        assert_eq!(e.id(), None);
    }

    #[test]
    fn apply_overlays_patch_fields_and_keeps_the_rest() {
        let mut e = entity(json!({"id": "e-1", "title": "old", "status": "pending"}));
        let patch = Patch::from_fields(
            entity(json!({"title": "new"})).into_fields(),
        );
        e.apply(&patch);
        assert_eq!(e.get("title"), Some(&json!("new")));
        assert_eq!(e.get("status"), Some(&json!("pending")));
    }

    #[test]
    fn entity_serializes_transparently() {
        let e = entity(json!({"id": "e-1"}));
        assert_eq!(serde_json::to_string(&e).unwrap(), r#"{"id":"e-1"}"#);
    }
}
