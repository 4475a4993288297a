//! Change tracking for attributes and relationships.
//!
//! Both trackers hold only deltas; the derived views (`changed_attributes`,
//! `changed_relationships`, ...) are computed on read.

pub mod attributes;
pub mod relationships;

pub use attributes::{AttributeDelta, AttributeTracker};
pub use relationships::{RelationDelta, RelationshipTracker, ToManyDelta, ToOneDelta};
