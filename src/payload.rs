//! The persisted-payload shape exchanged with type services.
//!
//! Mirrors the JSON:API resource object:
//! `{type, id, attributes, relationships: {name: {data, links}}, links, meta}`.
//! Optional members distinguish "absent" from "present", which matters when
//! merging a server response into a live resource.

use crate::identifier::{deserialize_optional_id, Identifier};
use crate::schema::RelationKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Link name to URL, e.g. `{"self": "...", "related": "..."}`.
pub type Links = BTreeMap<String, String>;

/// Relationship linkage: a single (nullable) identifier or an ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    ToMany(Vec<Identifier>),
    ToOne(Option<Identifier>),
}

impl RelationshipData {
    /// Empty linkage for the given cardinality: `null` or `[]`.
    pub fn empty(kind: RelationKind) -> Self {
        match kind {
            RelationKind::ToOne => RelationshipData::ToOne(None),
            RelationKind::ToMany => RelationshipData::ToMany(Vec::new()),
        }
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            RelationshipData::ToOne(_) => RelationKind::ToOne,
            RelationshipData::ToMany(_) => RelationKind::ToMany,
        }
    }

    pub fn identifiers(&self) -> Vec<&Identifier> {
        match self {
            RelationshipData::ToOne(one) => one.iter().collect(),
            RelationshipData::ToMany(many) => many.iter().collect(),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.identifiers().into_iter().map(|ident| ident.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RelationshipData::ToOne(one) => one.is_none(),
            RelationshipData::ToMany(many) => many.is_empty(),
        }
    }
}

/// A relationship slot as stored on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSlot {
    pub data: RelationshipData,
    #[serde(default)]
    pub links: Links,
}

impl RelationshipSlot {
    pub fn empty(kind: RelationKind) -> Self {
        Self {
            data: RelationshipData::empty(kind),
            links: Links::new(),
        }
    }

    pub fn related_link(&self) -> Option<&str> {
        self.links.get("related").map(String::as_str)
    }
}

/// A relationship member of a payload; absent members are left untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipObject {
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<RelationshipData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl From<RelationshipSlot> for RelationshipObject {
    fn from(slot: RelationshipSlot) -> Self {
        Self {
            data: Some(slot.data),
            links: Some(slot.links),
            meta: None,
        }
    }
}

// `data: null` is present (to-one cleared), a missing key is absent.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<RelationshipData>, D::Error>
where
    D: Deserializer<'de>,
{
    RelationshipData::deserialize(deserializer).map(Some)
}

/// A JSON:API resource object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<BTreeMap<String, RelationshipObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl ResourceObject {
    pub fn new(resource_type: impl Into<String>, id: impl ToString) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        if let Value::Object(map) = attributes {
            self.attributes = Some(map);
        }
        self
    }

    pub fn with_relationship(mut self, name: impl Into<String>, relationship: RelationshipObject) -> Self {
        self.relationships
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), relationship);
        self
    }

    /// Adds a relationship carrying only a `related` link.
    pub fn with_related_link(self, name: impl Into<String>, url: impl Into<String>) -> Self {
        let links = Links::from([("related".to_string(), url.into())]);
        self.with_relationship(
            name,
            RelationshipObject {
                links: Some(links),
                ..RelationshipObject::default()
            },
        )
    }

    pub fn identifier(&self) -> Option<Identifier> {
        self.id
            .as_ref()
            .map(|id| Identifier::new(&self.resource_type, id))
    }
}

/// Primary data returned by a related-resource fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Collection(Vec<ResourceObject>),
    Single(Option<ResourceObject>),
}

impl PrimaryData {
    pub fn into_objects(self) -> Vec<ResourceObject> {
        match self {
            PrimaryData::Collection(objects) => objects,
            PrimaryData::Single(object) => object.into_iter().collect(),
        }
    }
}
