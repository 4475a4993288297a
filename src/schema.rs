//! # Model Definitions
//!
//! Static declarations that describe a resource type: its attributes (with an
//! expected value type and mutability) and its relations (name, target type,
//! inverse, cardinality).
//!
//! ## Key Types
//!
//! - [`ModelDefinition`]: The per-type prototype the store builds resources from.
//! - [`RelationMeta`]: Declared relation metadata (`{name, target_type, inverse, kind}`).
//! - [`AttributeMeta`] / [`AttrType`]: Declared attribute metadata used for soft validation.
//! - [`ResourceModel`]: Trait for typed domain wrappers around a [`Resource`].
//!
//! # Architecture Note
//! Target types are declared already pluralized (`"comments"`, not `"comment"`);
//! the store never inflects names.

use crate::resource::Resource;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    ToOne,
    ToMany,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::ToOne => write!(f, "to-one"),
            RelationKind::ToMany => write!(f, "to-many"),
        }
    }
}

/// Declared relation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMeta {
    pub name: String,
    pub target_type: String,
    pub inverse: Option<String>,
    pub kind: RelationKind,
}

impl RelationMeta {
    pub fn to_one(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::new(name, target_type, RelationKind::ToOne)
    }

    pub fn to_many(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::new(name, target_type, RelationKind::ToMany)
    }

    fn new(name: impl Into<String>, target_type: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            inverse: None,
            kind,
        }
    }

    /// Names the reciprocal relation on the target type.
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }
}

/// Expected value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    #[default]
    Any,
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
}

impl AttrType {
    /// Whether `value` has the shape this type expects.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            AttrType::Any => true,
            AttrType::String => value.is_string(),
            AttrType::Number => value.is_number(),
            AttrType::Boolean => value.is_boolean(),
            AttrType::Object => value.is_object(),
            AttrType::Array => value.is_array(),
            AttrType::Date => value.as_str().is_some_and(|text| {
                DateTime::parse_from_rfc3339(text).is_ok()
                    || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
            }),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Any => "any",
            AttrType::String => "string",
            AttrType::Number => "number",
            AttrType::Boolean => "boolean",
            AttrType::Date => "date",
            AttrType::Object => "object",
            AttrType::Array => "array",
        };
        f.write_str(name)
    }
}

/// Declared attribute metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMeta {
    pub name: String,
    pub attr_type: AttrType,
    pub mutable: bool,
}

/// The prototype a resource type is built from.
///
/// # Example
/// ```ignore
/// let posts = ModelDefinition::new("posts")
///     .attr("title", AttrType::String)
///     .relation(RelationMeta::to_one("author", "authors").with_inverse("posts"))
///     .relation(RelationMeta::to_many("comments", "comments").with_inverse("post"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub resource_type: String,
    attributes: Vec<AttributeMeta>,
    relations: Vec<RelationMeta>,
    cache_duration: Option<chrono::Duration>,
}

impl ModelDefinition {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: Vec::new(),
            relations: Vec::new(),
            cache_duration: None,
        }
    }

    /// Declares a mutable attribute.
    pub fn attr(self, name: impl Into<String>, attr_type: AttrType) -> Self {
        self.declare_attr(name.into(), attr_type, true)
    }

    /// Declares an attribute that may only be set by the server.
    pub fn immutable_attr(self, name: impl Into<String>, attr_type: AttrType) -> Self {
        self.declare_attr(name.into(), attr_type, false)
    }

    fn declare_attr(mut self, name: String, attr_type: AttrType, mutable: bool) -> Self {
        if !is_dasherized(&name) {
            warn!(resource_type = %self.resource_type, attribute = %name, "Attribute name should be dasherized");
        }
        self.attributes.push(AttributeMeta {
            name,
            attr_type,
            mutable,
        });
        self
    }

    pub fn relation(mut self, meta: RelationMeta) -> Self {
        if !is_dasherized(&meta.name) {
            warn!(resource_type = %self.resource_type, relation = %meta.name, "Relation name should be dasherized");
        }
        self.relations.push(meta);
        self
    }

    /// Overrides the store-wide cache duration for this type.
    pub fn with_cache_duration(mut self, duration: chrono::Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeMeta> {
        self.attributes.iter().find(|meta| meta.name == name)
    }

    pub fn attributes(&self) -> &[AttributeMeta] {
        &self.attributes
    }

    pub fn relation_meta(&self, name: &str) -> Option<&RelationMeta> {
        self.relations.iter().find(|meta| meta.name == name)
    }

    pub fn relations(&self) -> &[RelationMeta] {
        &self.relations
    }

    pub fn cache_duration(&self) -> Option<chrono::Duration> {
        self.cache_duration
    }
}

fn is_dasherized(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Trait for typed domain wrappers over a [`Resource`].
///
/// # Architecture Note
/// The store works with untyped resources; a `ResourceModel` adds typed
/// accessors on top. Registering a model with
/// [`Store::register`](crate::lifecycle::Store::register) installs its
/// definition, and [`Store::find_as`](crate::lifecycle::Store::find_as) hands the
/// result back wrapped.
pub trait ResourceModel: Sized {
    /// Pluralized resource type, e.g. `"posts"`.
    const TYPE: &'static str;

    fn definition() -> ModelDefinition;

    fn from_resource(resource: Resource) -> Self;

    fn resource(&self) -> &Resource;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attr_types_check_value_shape() {
        assert!(AttrType::String.matches(&json!("hello")));
        assert!(!AttrType::String.matches(&json!(3)));
        assert!(AttrType::Number.matches(&json!(3.5)));
        assert!(AttrType::Date.matches(&json!("2015-02-18T16:10:35Z")));
        assert!(AttrType::Date.matches(&json!("2015-02-18")));
        assert!(!AttrType::Date.matches(&json!("yesterday")));
        assert!(AttrType::Any.matches(&json!(null)));
    }

    #[test]
    fn definition_lookups() {
        let def = ModelDefinition::new("posts")
            .attr("title", AttrType::String)
            .immutable_attr("created-at", AttrType::Date)
            .relation(RelationMeta::to_many("comments", "comments").with_inverse("post"));

        assert!(def.attribute("title").is_some_and(|meta| meta.mutable));
        assert!(def.attribute("created-at").is_some_and(|meta| !meta.mutable));
        let comments = def.relation_meta("comments").unwrap();
        assert_eq!(comments.kind, RelationKind::ToMany);
        assert_eq!(comments.inverse.as_deref(), Some("post"));
        assert!(def.relation_meta("author").is_none());
    }

    #[test]
    fn dasherized_names() {
        assert!(is_dasherized("created-at"));
        assert!(!is_dasherized("createdAt"));
        assert!(!is_dasherized("created_at"));
    }
}
