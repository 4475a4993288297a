//! Resource identifiers.
//!
//! An [`Identifier`] is the `{type, id}` pair that references a resource without
//! embedding its state. Ids are always kept in string form: payloads that carry
//! numeric ids are normalized while deserializing.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A `{type, id}` reference to a resource. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

impl Identifier {
    pub fn new(resource_type: impl Into<String>, id: impl ToString) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    /// True when this identifier points at `id` of `resource_type`.
    pub fn refers_to(&self, resource_type: &str, id: &str) -> bool {
        self.resource_type == resource_type && self.id == id
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Signed(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
            RawId::Float(n) => n.to_string(),
        }
    }
}

/// Accepts string or numeric ids and normalizes them to a string.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_are_normalized() {
        let ident: Identifier = serde_json::from_value(json!({"type": "posts", "id": 42})).unwrap();
        assert_eq!(ident, Identifier::new("posts", "42"));
    }

    #[test]
    fn serializes_with_type_key() {
        let value = serde_json::to_value(Identifier::new("comments", 4)).unwrap();
        assert_eq!(value, json!({"type": "comments", "id": "4"}));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Identifier::new("posts", "1"), Identifier::new("posts", 1));
        assert_ne!(Identifier::new("posts", "1"), Identifier::new("authors", "1"));
        assert!(Identifier::new("posts", "1").refers_to("posts", "1"));
    }
}
