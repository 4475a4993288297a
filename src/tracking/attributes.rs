//! Attribute change tracking.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The value an attribute had before its first local change, and its current value.
///
/// `previous` is `None` when the key was absent from the attribute bag.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDelta {
    pub previous: Option<Value>,
    pub changed: Value,
}

/// Per-resource attribute deltas plus the ordered set of dirty keys.
///
/// A key reverted to its `previous` value leaves the dirty set but keeps its
/// delta until the next reset.
#[derive(Debug, Clone, Default)]
pub struct AttributeTracker {
    deltas: BTreeMap<String, AttributeDelta>,
    dirty: Vec<String>,
}

impl AttributeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change of `key` from `last` (`None` when absent) to `value`.
    pub fn record(&mut self, key: &str, last: Option<&Value>, value: &Value) {
        let reverted = match self.deltas.get_mut(key) {
            Some(delta) => {
                delta.changed = value.clone();
                delta.previous.as_ref() == Some(value)
            }
            None => {
                self.deltas.insert(
                    key.to_owned(),
                    AttributeDelta {
                        previous: last.cloned(),
                        changed: value.clone(),
                    },
                );
                false
            }
        };

        if reverted {
            self.dirty.retain(|k| k != key);
        } else if !self.dirty.iter().any(|k| k == key) {
            self.dirty.push(key.to_owned());
        }
    }

    pub fn delta(&self, key: &str) -> Option<&AttributeDelta> {
        self.deltas.get(key)
    }

    pub fn dirty_keys(&self) -> &[String] {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty key to current value.
    pub fn changed_attributes(&self) -> Map<String, Value> {
        self.dirty_view(|delta| delta.changed.clone())
    }

    /// Dirty key to value before the first change. Keys that were absent map to null.
    pub fn previous_attributes(&self) -> Map<String, Value> {
        self.dirty_view(|delta| delta.previous.clone().unwrap_or(Value::Null))
    }

    fn dirty_view(&self, pick: impl Fn(&AttributeDelta) -> Value) -> Map<String, Value> {
        self.dirty
            .iter()
            .filter_map(|key| self.deltas.get(key).map(|delta| (key.clone(), pick(delta))))
            .collect()
    }

    /// Puts every dirty key in `attributes` back to its value before the first
    /// change, removing keys that did not exist, then clears all deltas.
    pub fn restore(&mut self, attributes: &mut Map<String, Value>) {
        for key in std::mem::take(&mut self.dirty) {
            match self.deltas.get(&key).map(|delta| delta.previous.clone()) {
                Some(Some(value)) => {
                    attributes.insert(key, value);
                }
                Some(None) => {
                    attributes.remove(&key);
                }
                None => {}
            }
        }
        self.deltas.clear();
    }

    pub fn reset(&mut self) {
        self.deltas.clear();
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_change_snapshots_previous() {
        let mut tracker = AttributeTracker::new();
        tracker.record("title", Some(&json!("Original")), &json!("First"));
        tracker.record("title", Some(&json!("First")), &json!("Second"));

        let delta = tracker.delta("title").unwrap();
        assert_eq!(delta.previous, Some(json!("Original")));
        assert_eq!(delta.changed, json!("Second"));
        assert_eq!(tracker.changed_attributes().get("title"), Some(&json!("Second")));
        assert_eq!(tracker.previous_attributes().get("title"), Some(&json!("Original")));
    }

    #[test]
    fn reverting_clears_dirty_but_keeps_previous() {
        let mut tracker = AttributeTracker::new();
        tracker.record("title", Some(&json!("Original")), &json!("Changed"));
        assert!(tracker.is_dirty());

        tracker.record("title", Some(&json!("Changed")), &json!("Original"));
        assert!(!tracker.is_dirty());
        assert!(tracker.changed_attributes().is_empty());
        assert_eq!(tracker.delta("title").unwrap().previous, Some(json!("Original")));

        tracker.record("title", Some(&json!("Original")), &json!("Again"));
        assert_eq!(tracker.dirty_keys(), ["title".to_string()]);
    }

    #[test]
    fn dirty_keys_keep_mutation_order() {
        let mut tracker = AttributeTracker::new();
        tracker.record("excerpt", None, &json!("b"));
        tracker.record("title", None, &json!("a"));
        tracker.record("excerpt", Some(&json!("b")), &json!("c"));
        assert_eq!(tracker.dirty_keys(), ["excerpt".to_string(), "title".to_string()]);

        tracker.reset();
        assert!(!tracker.is_dirty());
        assert!(tracker.delta("title").is_none());
    }

    #[test]
    fn restore_removes_keys_that_were_absent() {
        let mut tracker = AttributeTracker::new();
        let mut attributes = Map::new();
        attributes.insert("title".into(), json!("Hello"));
        let before = attributes.clone();

        attributes.insert("excerpt".into(), json!("x"));
        tracker.record("excerpt", None, &json!("x"));
        attributes.insert("title".into(), json!("Changed"));
        tracker.record("title", Some(&json!("Hello")), &json!("Changed"));
        assert_eq!(tracker.previous_attributes()["excerpt"], json!(null));

        tracker.restore(&mut attributes);

        assert_eq!(attributes, before);
        assert!(!tracker.is_dirty());
        assert!(tracker.delta("excerpt").is_none());
    }
}
