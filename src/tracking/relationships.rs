//! Relationship change tracking.
//!
//! To-one relations keep the value seen before the first change (which may be
//! `null`) and the current value. To-many relations keep net `added`/`removed`
//! sets: re-adding a removed id cancels the removal rather than recording an
//! addition. Both remember the state before the first change so rollback can
//! restore it exactly.

use crate::identifier::Identifier;
use crate::schema::{RelationKind, RelationMeta};
use std::collections::BTreeMap;

/// To-one change record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToOneDelta {
    original: Option<Option<Identifier>>,
    changed: Option<Identifier>,
}

impl ToOneDelta {
    /// The identifier held before the first change, if it was not null.
    pub fn previous(&self) -> Option<&Identifier> {
        self.original.as_ref().and_then(Option::as_ref)
    }

    pub fn changed(&self) -> Option<&Identifier> {
        self.changed.as_ref()
    }

    /// The value before the first change; `None` when untouched.
    pub fn original(&self) -> Option<Option<&Identifier>> {
        self.original.as_ref().map(Option::as_ref)
    }

    pub fn is_dirty(&self) -> bool {
        self.previous().is_some() || self.changed.is_some()
    }
}

/// To-many change record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToManyDelta {
    original: Option<Vec<Identifier>>,
    added: Vec<Identifier>,
    removed: Vec<Identifier>,
}

impl ToManyDelta {
    pub fn added(&self) -> &[Identifier] {
        &self.added
    }

    pub fn removed(&self) -> &[Identifier] {
        &self.removed
    }

    /// Membership before the first change; `None` when untouched.
    pub fn original(&self) -> Option<&[Identifier]> {
        self.original.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelationDelta {
    ToOne(ToOneDelta),
    ToMany(ToManyDelta),
}

impl RelationDelta {
    pub fn empty(kind: RelationKind) -> Self {
        match kind {
            RelationKind::ToOne => RelationDelta::ToOne(ToOneDelta::default()),
            RelationKind::ToMany => RelationDelta::ToMany(ToManyDelta::default()),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            RelationDelta::ToOne(delta) => delta.is_dirty(),
            RelationDelta::ToMany(delta) => delta.is_dirty(),
        }
    }

    /// Whether any change was recorded since the last reset, dirty or not.
    pub fn is_touched(&self) -> bool {
        match self {
            RelationDelta::ToOne(delta) => delta.original.is_some(),
            RelationDelta::ToMany(delta) => delta.original.is_some(),
        }
    }
}

/// Per-resource relationship deltas keyed by relation name.
#[derive(Debug, Clone, Default)]
pub struct RelationshipTracker {
    deltas: BTreeMap<String, RelationDelta>,
}

impl RelationshipTracker {
    /// Creates a tracker with an empty record for every declared relation.
    pub fn new(relations: &[RelationMeta]) -> Self {
        let mut tracker = Self::default();
        tracker.reset(relations);
        tracker
    }

    pub fn reset(&mut self, relations: &[RelationMeta]) {
        self.deltas = relations
            .iter()
            .map(|meta| (meta.name.clone(), RelationDelta::empty(meta.kind)))
            .collect();
    }

    /// Records a to-one change from `current` to `next`.
    pub fn record_to_one(&mut self, relation: &str, current: Option<&Identifier>, next: Option<Identifier>) {
        if let RelationDelta::ToOne(delta) = self.entry(relation, RelationKind::ToOne) {
            if delta.original.is_none() {
                delta.original = Some(current.cloned());
            }
            delta.changed = next;
        }
    }

    /// Records `ident` joining a to-many relation whose data is `current`.
    pub fn record_added(&mut self, relation: &str, current: &[Identifier], ident: Identifier) {
        if let RelationDelta::ToMany(delta) = self.entry(relation, RelationKind::ToMany) {
            delta.original.get_or_insert_with(|| current.to_vec());
            if let Some(pos) = delta.removed.iter().position(|i| *i == ident) {
                delta.removed.remove(pos);
            } else if !delta.added.contains(&ident) {
                delta.added.push(ident);
            }
        }
    }

    /// Records `ident` leaving a to-many relation whose data is `current`.
    pub fn record_removed(&mut self, relation: &str, current: &[Identifier], ident: Identifier) {
        if let RelationDelta::ToMany(delta) = self.entry(relation, RelationKind::ToMany) {
            delta.original.get_or_insert_with(|| current.to_vec());
            if let Some(pos) = delta.added.iter().position(|i| *i == ident) {
                delta.added.remove(pos);
            } else if !delta.removed.contains(&ident) {
                delta.removed.push(ident);
            }
        }
    }

    fn entry(&mut self, relation: &str, kind: RelationKind) -> &mut RelationDelta {
        self.deltas
            .entry(relation.to_owned())
            .or_insert_with(|| RelationDelta::empty(kind))
    }

    pub fn delta(&self, relation: &str) -> Option<&RelationDelta> {
        self.deltas.get(relation)
    }

    /// Names of relations with a dirty delta.
    pub fn changed_relationships(&self) -> Vec<String> {
        self.deltas
            .iter()
            .filter(|(_, delta)| delta.is_dirty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Relations changed since the last reset, with their deltas.
    pub fn touched(&self) -> Vec<(String, RelationDelta)> {
        self.deltas
            .iter()
            .filter(|(_, delta)| delta.is_touched())
            .map(|(name, delta)| (name.clone(), delta.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.deltas.values().any(RelationDelta::is_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str) -> Identifier {
        Identifier::new("comments", id)
    }

    fn relations() -> Vec<RelationMeta> {
        vec![
            RelationMeta::to_one("author", "authors"),
            RelationMeta::to_many("comments", "comments"),
        ]
    }

    #[test]
    fn starts_clean_with_a_record_per_relation() {
        let tracker = RelationshipTracker::new(&relations());
        assert!(!tracker.is_dirty());
        assert!(matches!(tracker.delta("author"), Some(RelationDelta::ToOne(_))));
        assert!(matches!(tracker.delta("comments"), Some(RelationDelta::ToMany(_))));
    }

    #[test]
    fn to_one_first_previous_wins() {
        let mut tracker = RelationshipTracker::new(&relations());
        let first = Identifier::new("authors", "1");
        let second = Identifier::new("authors", "2");
        let third = Identifier::new("authors", "3");

        tracker.record_to_one("author", Some(&first), Some(second.clone()));
        tracker.record_to_one("author", Some(&second), Some(third.clone()));

        let Some(RelationDelta::ToOne(delta)) = tracker.delta("author") else {
            panic!("expected to-one delta");
        };
        assert_eq!(delta.previous(), Some(&first));
        assert_eq!(delta.changed(), Some(&third));
        assert_eq!(tracker.changed_relationships(), vec!["author".to_string()]);
    }

    #[test]
    fn to_one_set_then_cleared_from_null_is_clean() {
        let mut tracker = RelationshipTracker::new(&relations());
        let author = Identifier::new("authors", "1");
        tracker.record_to_one("author", None, Some(author.clone()));
        assert!(tracker.is_dirty());

        tracker.record_to_one("author", Some(&author), None);
        assert!(!tracker.is_dirty());
        assert_eq!(tracker.touched().len(), 1);
    }

    #[test]
    fn to_many_deltas_are_net() {
        let mut tracker = RelationshipTracker::new(&relations());
        let original = vec![comment("4")];

        tracker.record_removed("comments", &original, comment("4"));
        tracker.record_added("comments", &[], comment("4"));
        assert!(!tracker.is_dirty());

        tracker.record_added("comments", &original, comment("5"));
        tracker.record_added("comments", &original, comment("5"));
        let Some(RelationDelta::ToMany(delta)) = tracker.delta("comments") else {
            panic!("expected to-many delta");
        };
        assert_eq!(delta.added(), [comment("5")]);
        assert!(delta.removed().is_empty());
        assert_eq!(delta.original(), Some(original.as_slice()));
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = RelationshipTracker::new(&relations());
        tracker.record_added("comments", &[], comment("1"));
        tracker.reset(&relations());
        assert!(!tracker.is_dirty());
        assert!(tracker.touched().is_empty());
    }
}
