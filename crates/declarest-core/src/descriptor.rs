// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource descriptors: immutable declarations of a resource's path, field
//! rules, notification topic, and auth policy.
//!
//! Descriptors are built once at startup through [`DescriptorBuilder`] and
//! never mutated. The builder validates the base path, the derived table
//! name, and the notification topic up front, so a bad declaration fails at
//! construction rather than on the first request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Entity, Fields, Patch};
use crate::error::Error;

/// Declaration of a single entity field.
///
/// `required` is enforced only on creation. `readonly` fields are immutable
/// after creation: the request body may seed their initial value on create,
/// but any value supplied for them on update is discarded before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        FieldSpec {
            name: name.into(),
            required: false,
            readonly: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Access policy for a resource or an individual route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthPolicy {
    /// Required role. `None` means any authenticated identity passes.
    pub role: Option<String>,
}

impl AuthPolicy {
    /// Any authenticated identity.
    pub fn authenticated() -> Self {
        AuthPolicy { role: None }
    }

    /// Identities carrying the given role.
    pub fn role(role: impl Into<String>) -> Self {
        AuthPolicy {
            role: Some(role.into()),
        }
    }
}

/// Immutable declaration of one CRUD resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    base_path: String,
    table_name: String,
    fields: Vec<FieldSpec>,
    notify_topic: Option<String>,
    auth: Option<AuthPolicy>,
}

impl ResourceDescriptor {
    pub fn builder(base_path: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            base_path: base_path.into(),
            fields: Vec::new(),
            notify_topic: None,
            auth: None,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Storage table name, derived from the last base-path segment.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn notify_topic(&self) -> Option<&str> {
        self.notify_topic.as_deref()
    }

    pub fn auth_policy(&self) -> Option<&AuthPolicy> {
        self.auth.as_ref()
    }

    /// Check a creation body against the required-field rules.
    ///
    /// A required field fails when it is absent or empty: `null`, `false`,
    /// `""`, and `0` all count as empty.
    pub fn validate_create(&self, body: &Fields) -> Result<(), Error> {
        for spec in self.fields.iter().filter(|s| s.required) {
            if is_empty_value(body.get(&spec.name)) {
                return Err(Error::Validation {
                    field: spec.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Build the stored entity for a create: declared defaults first, then
    /// the request body layered over them.
    pub fn compose(&self, body: Fields) -> Entity {
        let mut fields = Fields::new();
        for spec in &self.fields {
            if let Some(default) = &spec.default {
                fields.insert(spec.name.clone(), default.clone());
            }
        }
        for (name, value) in body {
            fields.insert(name, value);
        }
        Entity::new(fields)
    }

    /// Turn an update body into a [`Patch`], dropping every readonly field
    /// so no client-supplied value can overwrite one.
    pub fn sanitize_patch(&self, mut body: Fields) -> Patch {
        for spec in self.fields.iter().filter(|s| s.readonly) {
            body.remove(&spec.name);
        }
        Patch::from_fields(body)
    }
}

/// Builder for [`ResourceDescriptor`]; `build` validates identifiers.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    base_path: String,
    fields: Vec<FieldSpec>,
    notify_topic: Option<String>,
    auth: Option<AuthPolicy>,
}

impl DescriptorBuilder {
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn notify(mut self, topic: impl Into<String>) -> Self {
        self.notify_topic = Some(topic.into());
        self
    }

    pub fn auth(mut self, policy: AuthPolicy) -> Self {
        self.auth = Some(policy);
        self
    }

    pub fn build(self) -> Result<ResourceDescriptor, Error> {
        if !self.base_path.starts_with('/') || self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path `{}` must start with `/` and not end with one",
                self.base_path
            )));
        }
        let table_name = self
            .base_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        validate_identifier("table name", &table_name)?;
        if let Some(topic) = &self.notify_topic {
            validate_identifier("notification topic", topic)?;
        }
        Ok(ResourceDescriptor {
            base_path: self.base_path,
            table_name,
            fields: self.fields,
            notify_topic: self.notify_topic,
            auth: self.auth,
        })
    }
}

/// Validate a table or topic identifier: non-empty, `[A-Za-z0-9_]` only,
/// not starting with a digit. Anything else cannot be parameterized safely
/// and fails at construction.
pub fn validate_identifier(kind: &str, ident: &str) -> Result<(), Error> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid {kind}: `{ident}`")))
    }
}

/// Absent or empty, as seen by the required-field check on creation.
fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn todos() -> ResourceDescriptor {
        ResourceDescriptor::builder("/api/todos")
            .field(FieldSpec::new("title").required())
            .field(FieldSpec::new("status").default_value(json!("pending")))
            .field(FieldSpec::new("created_at").readonly())
            .notify("todos")
            .build()
            .unwrap()
    }

    fn fields(v: serde_json::Value) -> Fields {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn table_name_derives_from_last_segment() {
        assert_eq!(todos().table_name(), "todos");
    }

    #[test]
    fn bad_base_paths_fail_at_build() {
        assert!(ResourceDescriptor::builder("api/todos").build().is_err());
        assert!(ResourceDescriptor::builder("/api/todos/").build().is_err());
        assert!(ResourceDescriptor::builder("/api/to-dos").build().is_err());
    }

    #[test]
    fn bad_topic_fails_at_build() {
        let result = ResourceDescriptor::builder("/api/todos")
            .notify("todos; DROP TABLE")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn identifier_rules() {
        assert!(validate_identifier("table name", "todos_v2").is_ok());
        assert!(validate_identifier("table name", "_private").is_ok());
        assert!(validate_identifier("table name", "2fast").is_err());
        assert!(validate_identifier("table name", "").is_err());
        assert!(validate_identifier("table name", "a b").is_err());
    }

    #[test]
    fn required_field_rejects_absent_and_empty() {
        let d = todos();
        for body in [
            json!({}),
            json!({"title": null}),
            json!({"title": ""}),
            json!({"title": false}),
            json!({"title": 0}),
        ] {
            let err = d.validate_create(&fields(body)).unwrap_err();
            match err {
                Error::Validation { field } => assert_eq!(field, "title"),
                other => panic!("expected validation error, got {other}"),
            }
        }
        assert!(d.validate_create(&fields(json!({"title": "x"}))).is_ok());
    }

    #[test]
    fn compose_layers_body_over_defaults() {
        let d = todos();
        let e = d.compose(fields(json!({"title": "Buy milk"})));
        assert_eq!(e.get("status"), Some(&json!("pending")));
        assert_eq!(e.get("title"), Some(&json!("Buy milk")));

        let e = d.compose(fields(json!({"title": "x", "status": "done"})));
        assert_eq!(e.get("status"), Some(&json!("done")));
    }

    #[test]
    fn sanitize_patch_strips_readonly_fields() {
        let d = todos();
        let patch = d.sanitize_patch(fields(json!({
            "title": "new",
            "created_at": "1999-01-01T00:00:00Z"
        })));
        assert!(patch.fields().contains_key("title"));
        assert!(!patch.fields().contains_key("created_at"));
    }
}
