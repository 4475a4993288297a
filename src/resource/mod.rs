//! # Resource Entity
//!
//! A [`Resource`] aggregates identity, the attribute bag, relationship slots and
//! both change trackers. It is a cheap, cloneable handle: every clone points at
//! the same live instance, and the store guarantees at most one live instance
//! per `(type, id)`.
//!
//! ## Layout
//!
//! - This module: construction, identity, attributes and lifecycle flags.
//! - [`relationships`]: `add_relationship`, `remove_relationship`,
//!   `update_relationship` and inverse propagation.
//! - [`persistence`]: `rollback`, `reconcile_with_server`, `save`, `delete`.
//!
//! # Architecture Note
//! State lives behind `Rc<RefCell<..>>`. Execution is single-threaded and
//! synchronous mutations run to completion, so a borrow is never held across an
//! `.await` or while another resource is being mutated. Methods that touch more
//! than one resource (inverse propagation, proxy patching) release their own
//! borrow before reaching across.

pub mod persistence;
pub mod relationships;

pub use relationships::{Propagation, RelatedIds, RelatedRef};

use crate::error::StoreError;
use crate::identifier::Identifier;
use crate::lifecycle::store::{Store, StoreInner};
use crate::payload::{Links, RelationshipData, RelationshipObject, RelationshipSlot, ResourceObject};
use crate::proxy::{RelatedProxy, WeakProxy};
use crate::schema::{ModelDefinition, RelationKind};
use crate::tracking::{AttributeDelta, AttributeTracker, RelationDelta, RelationshipTracker};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

pub(crate) struct ResourceState {
    pub(crate) definition: Rc<ModelDefinition>,
    pub(crate) id: Option<String>,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) relationships: BTreeMap<String, RelationshipSlot>,
    pub(crate) links: Links,
    pub(crate) meta: Map<String, Value>,
    pub(crate) is_new: bool,
    pub(crate) destroyed: bool,
    pub(crate) deleting: bool,
    pub(crate) delete_on_save: bool,
    pub(crate) attribute_tracker: AttributeTracker,
    pub(crate) relationship_tracker: RelationshipTracker,
    pub(crate) proxies: HashMap<String, RelatedProxy>,
    pub(crate) detach_hooks: Vec<WeakProxy>,
    pub(crate) cached_at: Option<DateTime<Utc>>,
    pub(crate) cache_duration: Duration,
}

impl ResourceState {
    fn label(&self) -> String {
        format!(
            "{}:{}",
            self.definition.resource_type,
            self.id.as_deref().unwrap_or("null")
        )
    }
}

/// Handle to a live resource.
#[derive(Clone)]
pub struct Resource {
    state: Rc<RefCell<ResourceState>>,
    store: Weak<StoreInner>,
}

/// Non-owning handle, upgraded while the resource is still alive.
#[derive(Clone)]
pub(crate) struct WeakResource {
    state: Weak<RefCell<ResourceState>>,
    store: Weak<StoreInner>,
}

impl WeakResource {
    pub(crate) fn upgrade(&self) -> Option<Resource> {
        self.state.upgrade().map(|state| Resource {
            state,
            store: self.store.clone(),
        })
    }
}

impl Resource {
    /// Builds an unsaved resource (`is_new`, no id) with empty relationship slots.
    pub(crate) fn new_unsaved(
        definition: Rc<ModelDefinition>,
        store: Weak<StoreInner>,
        cache_duration: Duration,
    ) -> Self {
        let relationships = definition
            .relations()
            .iter()
            .map(|meta| (meta.name.clone(), RelationshipSlot::empty(meta.kind)))
            .collect();
        let state = ResourceState {
            relationship_tracker: RelationshipTracker::new(definition.relations()),
            definition,
            id: None,
            attributes: Map::new(),
            relationships,
            links: Links::new(),
            meta: Map::new(),
            is_new: true,
            destroyed: false,
            deleting: false,
            delete_on_save: false,
            attribute_tracker: AttributeTracker::new(),
            proxies: HashMap::new(),
            detach_hooks: Vec::new(),
            cached_at: None,
            cache_duration,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            store,
        }
    }

    /// Builds a resource from a payload. A payload without an id yields a new resource.
    pub(crate) fn from_payload(
        definition: Rc<ModelDefinition>,
        payload: ResourceObject,
        store: Weak<StoreInner>,
        cache_duration: Duration,
    ) -> Result<Self, StoreError> {
        if payload.resource_type != definition.resource_type {
            return Err(StoreError::InvalidPayload(format!(
                "expected type {}, got {}",
                definition.resource_type, payload.resource_type
            )));
        }

        let resource = Self::new_unsaved(definition, store, cache_duration);
        {
            let mut state = resource.state.borrow_mut();
            let state = &mut *state;
            state.is_new = payload.id.is_none();
            state.id = payload.id;
            state.attributes = payload.attributes.unwrap_or_default();
            state.links = payload.links.unwrap_or_default();
            state.meta = payload.meta.unwrap_or_default();
            state.cached_at = local_timestamp(&state.meta);
            for (name, object) in payload.relationships.unwrap_or_default() {
                let kind = state.definition.relation_meta(&name).map(|meta| meta.kind);
                let slot = state
                    .relationships
                    .entry(name.clone())
                    .or_insert_with(|| RelationshipSlot::empty(kind.unwrap_or(RelationKind::ToOne)));
                merge_relationship(slot, &object, kind, &name)?;
            }
        }
        Ok(resource)
    }

    pub(crate) fn downgrade(&self) -> WeakResource {
        WeakResource {
            state: Rc::downgrade(&self.state),
            store: self.store.clone(),
        }
    }

    pub(crate) fn store(&self) -> Result<Store, StoreError> {
        Store::upgrade(&self.store).ok_or(StoreError::StoreClosed)
    }

    /// Whether both handles point at the same live instance.
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    // --- Identity ---

    pub fn resource_type(&self) -> String {
        self.state.borrow().definition.resource_type.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.state.borrow().id.clone()
    }

    pub fn identifier(&self) -> Option<Identifier> {
        let state = self.state.borrow();
        state
            .id
            .as_ref()
            .map(|id| Identifier::new(&state.definition.resource_type, id))
    }

    pub fn definition(&self) -> Rc<ModelDefinition> {
        self.state.borrow().definition.clone()
    }

    pub fn links(&self) -> Links {
        self.state.borrow().links.clone()
    }

    pub fn meta(&self) -> Map<String, Value> {
        self.state.borrow().meta.clone()
    }

    // --- Lifecycle flags ---

    pub fn is_new(&self) -> bool {
        self.state.borrow().is_new
    }

    /// True once destruction has begun. Irreversible.
    pub fn is_deleted(&self) -> bool {
        self.state.borrow().destroyed
    }

    pub fn is_dirty(&self) -> bool {
        let state = self.state.borrow();
        state.delete_on_save
            || state.attribute_tracker.is_dirty()
            || state.relationship_tracker.is_dirty()
    }

    // --- Attributes ---

    pub fn attributes(&self) -> Map<String, Value> {
        self.state.borrow().attributes.clone()
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.state.borrow().attributes.get(key).cloned()
    }

    /// Reads an attribute into a typed value; `None` when absent, null or of another shape.
    pub fn attr<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attribute(key)
            .filter(|value| !value.is_null())
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Sets an attribute, tracking the change unless the resource is new.
    ///
    /// Type mismatches against the declared [`AttrType`](crate::schema::AttrType)
    /// only warn. Immutable attributes reject the change and keep their value.
    pub fn set_attribute(&self, key: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        let value = value.into();
        let mut state = self.state.borrow_mut();
        let label = state.label();
        let meta = state.definition.attribute(key).cloned();
        let existing = state.attributes.get(key).cloned();
        let last = existing.clone().unwrap_or(Value::Null);

        if let Some(meta) = &meta {
            if !meta.mutable {
                warn!(resource = %label, key, previous = %last, rejected = %value, "Attribute is immutable");
                return Err(StoreError::ImmutableAttribute {
                    resource: label,
                    key: key.to_owned(),
                });
            }
        }
        if last == value {
            return Ok(());
        }
        if let Some(meta) = &meta {
            if !value.is_null() && !meta.attr_type.matches(&value) {
                warn!(resource = %label, key, expected = %meta.attr_type, %value, "Attribute type mismatch");
            }
        }

        state.attributes.insert(key.to_owned(), value.clone());
        if !state.is_new {
            state.attribute_tracker.record(key, existing.as_ref(), &value);
        }
        debug!(resource = %label, key, "Attribute set");
        Ok(())
    }

    /// Assigns an initial value on a resource being built, bypassing mutability.
    pub(crate) fn init_attribute(&self, key: &str, value: Value) {
        let mut state = self.state.borrow_mut();
        if let Some(meta) = state.definition.attribute(key) {
            if !value.is_null() && !meta.attr_type.matches(&value) {
                warn!(resource = %state.label(), key, expected = %meta.attr_type, %value, "Attribute type mismatch");
            }
        }
        state.attributes.insert(key.to_owned(), value);
    }

    pub fn changed_attributes(&self) -> Map<String, Value> {
        self.state.borrow().attribute_tracker.changed_attributes()
    }

    pub fn previous_attributes(&self) -> Map<String, Value> {
        self.state.borrow().attribute_tracker.previous_attributes()
    }

    pub fn attribute_delta(&self, key: &str) -> Option<AttributeDelta> {
        self.state.borrow().attribute_tracker.delta(key).cloned()
    }

    // --- Relationship reads ---

    pub fn relationship(&self, relation: &str) -> Option<RelationshipSlot> {
        self.state.borrow().relationships.get(relation).cloned()
    }

    pub fn relationships(&self) -> BTreeMap<String, RelationshipSlot> {
        self.state.borrow().relationships.clone()
    }

    /// Ids currently linked through `relation`, in order.
    pub fn related_ids(&self, relation: &str) -> Vec<String> {
        self.state
            .borrow()
            .relationships
            .get(relation)
            .map(|slot| slot.data.ids())
            .unwrap_or_default()
    }

    pub fn changed_relationships(&self) -> Vec<String> {
        self.state.borrow().relationship_tracker.changed_relationships()
    }

    pub fn relationship_delta(&self, relation: &str) -> Option<RelationDelta> {
        self.state.borrow().relationship_tracker.delta(relation).cloned()
    }

    // --- Cache freshness ---

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().cached_at
    }

    pub(crate) fn touch(&self, at: DateTime<Utc>) {
        self.state.borrow_mut().cached_at = Some(at);
    }

    pub fn cache_duration(&self) -> Duration {
        self.state.borrow().cache_duration
    }

    pub fn set_cache_duration(&self, duration: Duration) {
        self.state.borrow_mut().cache_duration = duration;
    }

    /// `cached_at + cache_duration <= now`; false when never cached.
    pub fn is_cache_expired(&self) -> bool {
        self.is_cache_expired_at(Utc::now())
    }

    pub fn is_cache_expired_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.borrow();
        state
            .cached_at
            .is_some_and(|cached_at| cached_at + state.cache_duration <= now)
    }

    // --- Serialization ---

    /// Current state in the JSON:API resource-object shape.
    pub fn to_payload(&self) -> ResourceObject {
        let state = self.state.borrow();
        ResourceObject {
            resource_type: state.definition.resource_type.clone(),
            id: state.id.clone(),
            attributes: Some(state.attributes.clone()),
            relationships: Some(
                state
                    .relationships
                    .iter()
                    .map(|(name, slot)| (name.clone(), RelationshipObject::from(slot.clone())))
                    .collect(),
            ),
            links: (!state.links.is_empty()).then(|| state.links.clone()),
            meta: (!state.meta.is_empty()).then(|| state.meta.clone()),
        }
    }

    // --- Proxy bookkeeping ---

    pub(crate) fn live_proxy(&self, relation: &str) -> Option<RelatedProxy> {
        self.state.borrow().proxies.get(relation).cloned()
    }

    pub(crate) fn register_proxy(&self, relation: &str, proxy: RelatedProxy) {
        self.state
            .borrow_mut()
            .proxies
            .insert(relation.to_owned(), proxy);
    }

    pub(crate) fn register_detach_hook(&self, hook: WeakProxy) {
        let mut state = self.state.borrow_mut();
        if !state.detach_hooks.iter().any(|existing| existing.ptr_eq(&hook)) {
            state.detach_hooks.push(hook);
        }
    }

    /// Drops live proxies, releasing the resources they hold.
    pub(crate) fn clear_proxies(&self) {
        let proxies = std::mem::take(&mut self.state.borrow_mut().proxies);
        drop(proxies);
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => write!(f, "[JSONAPIResource|{}]", state.label()),
            Err(_) => write!(f, "[JSONAPIResource|busy]"),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Resource")
                .field("type", &state.definition.resource_type)
                .field("id", &state.id)
                .field("is_new", &state.is_new)
                .field("attributes", &state.attributes)
                .finish_non_exhaustive(),
            Err(_) => f.write_str("Resource { .. }"),
        }
    }
}

/// Overwrites the members of `slot` present in `object`.
pub(crate) fn merge_relationship(
    slot: &mut RelationshipSlot,
    object: &RelationshipObject,
    kind: Option<RelationKind>,
    name: &str,
) -> Result<(), StoreError> {
    if let Some(links) = &object.links {
        slot.links = links.clone();
    }
    if let Some(data) = &object.data {
        slot.data = match (kind, data) {
            (Some(RelationKind::ToMany), RelationshipData::ToOne(None)) => {
                RelationshipData::ToMany(Vec::new())
            }
            (Some(kind), data) if data.kind() != kind => {
                return Err(StoreError::KindMismatch {
                    relation: name.to_owned(),
                    kind,
                })
            }
            (_, data) => data.clone(),
        };
    }
    Ok(())
}

/// Reads `meta.timeStamps.local` (epoch milliseconds).
fn local_timestamp(meta: &Map<String, Value>) -> Option<DateTime<Utc>> {
    meta.get("timeStamps")
        .and_then(|stamps| stamps.get("local"))
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
}
