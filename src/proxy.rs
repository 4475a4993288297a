//! # Related-Collection Proxy
//!
//! A [`RelatedProxy`] stands in for the materialized form of one relation of a
//! parent resource: zero-or-one resource for to-one relations, an ordered list
//! for to-many relations.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──resolve ok──▶ Resolved
//!    └────resolve err───▶ Failed
//! ```
//!
//! Both outcomes are terminal. Resolving again returns the stored outcome; a
//! caller that wants a fresh fetch builds a new proxy with [`RelatedProxy::new`].
//! A proxy built for a new parent starts out `Resolved` and empty.
//!
//! ## Resolution
//!
//! 1. If every id in the relationship data is live in the store's cache, the
//!    proxy resolves from those instances without touching the network.
//! 2. Otherwise the relation's `links.related` URL is fetched through the target
//!    type's [`TypeService`](crate::service::TypeService). A missing URL fails fast.
//! 3. The fetched resources become the content, then the parent's relationship
//!    data is reconciled with them.
//!
//! Every resource placed in the content registers a detach hook, so destroying
//! it removes it from the proxy.

use crate::error::StoreError;
use crate::payload::RelationshipSlot;
use crate::resource::{Resource, WeakResource};
use crate::schema::{RelationKind, RelationMeta};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, instrument};

/// Lifecycle of a proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyState {
    Pending,
    Resolved,
    Failed(StoreError),
}

/// Materialized related resources.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyContent {
    One(Option<Resource>),
    Many(Vec<Resource>),
}

impl ProxyContent {
    pub fn empty(kind: RelationKind) -> Self {
        match kind {
            RelationKind::ToOne => ProxyContent::One(None),
            RelationKind::ToMany => ProxyContent::Many(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ProxyContent::One(one) => usize::from(one.is_some()),
            ProxyContent::Many(many) => many.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resources(&self) -> Vec<Resource> {
        match self {
            ProxyContent::One(one) => one.iter().cloned().collect(),
            ProxyContent::Many(many) => many.clone(),
        }
    }

    pub fn first(&self) -> Option<Resource> {
        match self {
            ProxyContent::One(one) => one.clone(),
            ProxyContent::Many(many) => many.first().cloned(),
        }
    }

    /// Ids of the contained resources, skipping unsaved ones.
    pub fn ids(&self) -> Vec<String> {
        self.resources().iter().filter_map(Resource::id).collect()
    }
}

pub(crate) struct ProxyInner {
    parent: WeakResource,
    meta: RelationMeta,
    state: ProxyState,
    content: ProxyContent,
}

/// Lazily resolved container for one relation of a parent resource.
#[derive(Clone)]
pub struct RelatedProxy {
    inner: Rc<RefCell<ProxyInner>>,
}

/// Detach hook held by resources placed in a proxy.
#[derive(Clone)]
pub(crate) struct WeakProxy(Weak<RefCell<ProxyInner>>);

impl WeakProxy {
    pub(crate) fn upgrade(&self) -> Option<RelatedProxy> {
        self.0.upgrade().map(|inner| RelatedProxy { inner })
    }

    pub(crate) fn ptr_eq(&self, other: &WeakProxy) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl RelatedProxy {
    /// Builds a proxy for `relation` on `parent` and makes it the parent's live proxy.
    pub fn new(parent: &Resource, relation: &str) -> Result<Self, StoreError> {
        let meta = parent.relation_meta(relation)?;
        let state = if parent.is_new() {
            ProxyState::Resolved
        } else {
            ProxyState::Pending
        };
        let proxy = Self {
            inner: Rc::new(RefCell::new(ProxyInner {
                parent: parent.downgrade(),
                content: ProxyContent::empty(meta.kind),
                meta,
                state,
            })),
        };
        parent.register_proxy(relation, proxy.clone());
        Ok(proxy)
    }

    pub fn state(&self) -> ProxyState {
        self.inner.borrow().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().state, ProxyState::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.borrow().state, ProxyState::Resolved)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.inner.borrow().state, ProxyState::Failed(_))
    }

    /// Current content; empty until resolved.
    pub fn content(&self) -> ProxyContent {
        self.inner.borrow().content.clone()
    }

    pub fn relation(&self) -> String {
        self.inner.borrow().meta.name.clone()
    }

    pub fn kind(&self) -> RelationKind {
        self.inner.borrow().meta.kind
    }

    /// Resolves the proxy once; later calls return the stored outcome.
    #[instrument(skip(self), fields(relation = %self.relation()))]
    pub async fn resolve(&self) -> Result<ProxyContent, StoreError> {
        let (parent, meta) = {
            let inner = self.inner.borrow();
            match &inner.state {
                ProxyState::Resolved => return Ok(inner.content.clone()),
                ProxyState::Failed(err) => return Err(err.clone()),
                ProxyState::Pending => {}
            }
            (inner.parent.upgrade(), inner.meta.clone())
        };

        let loaded = match &parent {
            Some(parent) => self.load(parent, &meta).await,
            None => Err(StoreError::ResourceReleased(meta.name.clone())),
        };

        match (loaded, parent) {
            (Ok(resources), Some(parent)) => {
                self.fill(resources);
                let content = {
                    let mut inner = self.inner.borrow_mut();
                    inner.state = ProxyState::Resolved;
                    inner.content.clone()
                };
                parent.reconcile_relationship(&meta.name, &content)?;
                info!(resource = %parent, relation = %meta.name, size = content.len(), "Resolved");
                Ok(content)
            }
            (Ok(_), None) => Err(StoreError::ResourceReleased(meta.name)),
            (Err(err), _) => {
                error!(relation = %meta.name, error = %err, "Related resolution failed");
                self.inner.borrow_mut().state = ProxyState::Failed(err.clone());
                Err(err)
            }
        }
    }

    async fn load(&self, parent: &Resource, meta: &RelationMeta) -> Result<Vec<Resource>, StoreError> {
        let store = parent.store()?;
        let slot = parent
            .relationship(&meta.name)
            .unwrap_or_else(|| RelationshipSlot::empty(meta.kind));

        if let Some(cached) = store.lookup_all(&slot.data) {
            debug!(resource = %parent, relation = %meta.name, size = cached.len(), "Resolved from cache");
            return Ok(cached);
        }

        let url = slot
            .related_link()
            .ok_or_else(|| StoreError::MissingRelatedLink {
                resource: parent.to_string(),
                relation: meta.name.clone(),
            })?
            .to_owned();
        store.fetch_related(meta, &url).await
    }

    fn fill(&self, resources: Vec<Resource>) {
        match self.kind() {
            RelationKind::ToOne => {
                if let Some(first) = resources.first() {
                    self.attach(first);
                }
            }
            RelationKind::ToMany => {
                for resource in &resources {
                    self.attach(resource);
                }
            }
        }
    }

    /// Places `resource` in the content and registers its detach hook.
    pub(crate) fn attach(&self, resource: &Resource) {
        let added = {
            let mut inner = self.inner.borrow_mut();
            match &mut inner.content {
                ProxyContent::One(slot) => {
                    *slot = Some(resource.clone());
                    true
                }
                ProxyContent::Many(items) => {
                    if items.iter().any(|item| item.ptr_eq(resource)) {
                        false
                    } else {
                        items.push(resource.clone());
                        true
                    }
                }
            }
        };
        if added {
            resource.register_detach_hook(self.downgrade());
        }
    }

    /// Drops `resource` from the content.
    pub(crate) fn detach(&self, resource: &Resource) {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.content {
            ProxyContent::One(slot) => {
                if slot.as_ref().is_some_and(|current| current.ptr_eq(resource)) {
                    *slot = None;
                }
            }
            ProxyContent::Many(items) => items.retain(|item| !item.ptr_eq(resource)),
        }
    }

    /// Drops every item whose id is `id`.
    pub(crate) fn detach_id(&self, id: &str) {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.content {
            ProxyContent::One(slot) => {
                if slot.as_ref().and_then(Resource::id).as_deref() == Some(id) {
                    *slot = None;
                }
            }
            ProxyContent::Many(items) => items.retain(|item| item.id().as_deref() != Some(id)),
        }
    }

    pub(crate) fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        let kind = inner.meta.kind;
        inner.content = ProxyContent::empty(kind);
    }

    fn downgrade(&self) -> WeakProxy {
        WeakProxy(Rc::downgrade(&self.inner))
    }
}

impl std::fmt::Debug for RelatedProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("RelatedProxy")
                .field("relation", &inner.meta.name)
                .field("state", &inner.state)
                .field("size", &inner.content.len())
                .finish(),
            Err(_) => f.write_str("RelatedProxy { .. }"),
        }
    }
}
