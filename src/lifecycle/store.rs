use crate::cache::ResourceCache;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::payload::{PrimaryData, RelationshipData, ResourceObject};
use crate::resource::{RelatedIds, Resource};
use crate::schema::{ModelDefinition, RelationMeta, ResourceModel};
use crate::service::TypeService;
use chrono::{Duration, Utc};
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, info, instrument, warn};

type SharedFetch = Shared<LocalBoxFuture<'static, Result<PrimaryData, StoreError>>>;

pub(crate) struct StoreInner {
    config: StoreConfig,
    models: RefCell<HashMap<String, Rc<ModelDefinition>>>,
    services: RefCell<HashMap<String, Rc<dyn TypeService>>>,
    caches: RefCell<HashMap<String, ResourceCache>>,
    in_flight: RefCell<HashMap<String, SharedFetch>>,
}

/// The session-scoped registry behind every resource.
///
/// `Store` is responsible for:
/// - **Model factory**: building resources from registered [`ModelDefinition`]s
/// - **Service lookup**: routing persistence and fetches to each type's [`TypeService`]
/// - **Caching**: one [`ResourceCache`] per type, so at most one live instance exists per `(type, id)`
/// - **Fetch coalescing**: sharing one in-flight related fetch per URL
///
/// Resources hold a weak reference back to the store they were built by, so
/// dropping the last `Store` handle (or calling [`teardown`](Store::teardown))
/// ends the session.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(StoreConfig::default());
/// store.register::<Post>();
/// store.register_service("posts", PostService::new(http));
///
/// let post = store.find_as::<Post>("1").await?;
/// let comments = post.comments()?.resolve().await?;
///
/// store.teardown();
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        info!(
            cache_duration_ms = config.cache_duration_ms,
            coalesce_fetches = config.coalesce_fetches,
            "Store created"
        );
        Self {
            inner: Rc::new(StoreInner {
                config,
                models: RefCell::new(HashMap::new()),
                services: RefCell::new(HashMap::new()),
                caches: RefCell::new(HashMap::new()),
                in_flight: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn upgrade(weak: &Weak<StoreInner>) -> Option<Store> {
        weak.upgrade().map(|inner| Store { inner })
    }

    fn downgrade(&self) -> Weak<StoreInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn register_model(&self, definition: ModelDefinition) {
        info!(
            resource_type = %definition.resource_type,
            relations = definition.relations().len(),
            "Model registered"
        );
        self.inner
            .models
            .borrow_mut()
            .insert(definition.resource_type.clone(), Rc::new(definition));
    }

    /// Registers the definition of a typed model.
    pub fn register<M: ResourceModel>(&self) {
        self.register_model(M::definition());
    }

    pub fn register_service<S: TypeService + 'static>(&self, resource_type: &str, service: S) {
        info!(resource_type, "Service registered");
        self.inner
            .services
            .borrow_mut()
            .insert(resource_type.to_owned(), Rc::new(service));
    }

    pub fn model(&self, resource_type: &str) -> Result<Rc<ModelDefinition>, StoreError> {
        self.inner
            .models
            .borrow()
            .get(resource_type)
            .cloned()
            .ok_or_else(|| StoreError::UnknownModel(resource_type.to_owned()))
    }

    pub fn service(&self, resource_type: &str) -> Result<Rc<dyn TypeService>, StoreError> {
        self.inner
            .services
            .borrow()
            .get(resource_type)
            .cloned()
            .ok_or_else(|| StoreError::ServiceNotRegistered(resource_type.to_owned()))
    }

    fn cache_duration_for(&self, definition: &ModelDefinition) -> Duration {
        definition
            .cache_duration()
            .unwrap_or_else(|| self.inner.config.cache_duration())
    }

    // =========================================================================
    // Model factory
    // =========================================================================

    /// Builds a new, unsaved resource.
    pub fn build(&self, resource_type: &str) -> Result<Resource, StoreError> {
        let definition = self.model(resource_type)?;
        let duration = self.cache_duration_for(&definition);
        Ok(Resource::new_unsaved(definition, self.downgrade(), duration))
    }

    /// Builds a new resource with initial attributes and relationships.
    pub fn create(
        &self,
        resource_type: &str,
        attributes: Value,
        relationships: &[(&str, RelatedIds)],
    ) -> Result<Resource, StoreError> {
        let resource = self.build(resource_type)?;
        if let Value::Object(attributes) = attributes {
            for (key, value) in attributes {
                resource.init_attribute(&key, value);
            }
        }
        for (relation, ids) in relationships {
            match ids {
                RelatedIds::One(Some(id)) => resource.add_relationship(relation, id.as_str())?,
                RelatedIds::One(None) => {}
                RelatedIds::Many(ids) => resource.add_relationships(relation, ids.iter().map(String::as_str))?,
            }
        }
        debug!(resource = %resource, "Created");
        Ok(resource)
    }

    /// Materializes a persisted payload.
    ///
    /// A live instance for the same `(type, id)` is reused: it is reconciled with
    /// the payload unless it carries local changes, which are kept.
    pub fn push(&self, payload: ResourceObject) -> Result<Resource, StoreError> {
        let definition = self.model(&payload.resource_type)?;
        if let Some(id) = payload.id.clone() {
            if let Some(existing) = self.cache_lookup(&payload.resource_type, &id) {
                if existing.is_dirty() {
                    debug!(resource = %existing, "Keeping local changes");
                } else {
                    existing.reconcile_with_server(&payload)?;
                }
                existing.touch(Utc::now());
                return Ok(existing);
            }
        }

        let duration = self.cache_duration_for(&definition);
        let resource = Resource::from_payload(definition, payload, self.downgrade(), duration)?;
        if !resource.is_new() {
            self.cache_resource(&resource)?;
        }
        Ok(resource)
    }

    pub fn push_document(&self, data: PrimaryData) -> Result<Vec<Resource>, StoreError> {
        data.into_objects()
            .into_iter()
            .map(|object| self.push(object))
            .collect()
    }

    // =========================================================================
    // Cache
    // =========================================================================

    pub fn cache_lookup(&self, resource_type: &str, id: &str) -> Option<Resource> {
        self.inner
            .caches
            .borrow()
            .get(resource_type)
            .and_then(|cache| cache.lookup(id))
    }

    pub fn peek(&self, resource_type: &str, id: &str) -> Option<Resource> {
        self.cache_lookup(resource_type, id)
    }

    /// Every cached resource of a type, in insertion order.
    pub fn peek_all(&self, resource_type: &str) -> Vec<Resource> {
        self.inner
            .caches
            .borrow()
            .get(resource_type)
            .map(ResourceCache::all)
            .unwrap_or_default()
    }

    /// Registers a persisted resource and stamps it unless it already carries a timestamp.
    pub fn cache_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        let resource_type = resource.resource_type();
        if resource.cached_at().is_none() {
            resource.touch(Utc::now());
        }
        let size = {
            let mut caches = self.inner.caches.borrow_mut();
            let cache = caches
                .entry(resource_type.clone())
                .or_insert_with(|| ResourceCache::new(&resource_type));
            cache.store(resource.clone())?;
            cache.len()
        };
        info!(resource = %resource, size, "Cached");
        Ok(())
    }

    /// Removes `resource` from its cache if it is the registered instance.
    pub(crate) fn evict(&self, resource: &Resource) {
        let Some(id) = resource.id() else {
            return;
        };
        let resource_type = resource.resource_type();
        let mut caches = self.inner.caches.borrow_mut();
        if let Some(cache) = caches.get_mut(&resource_type) {
            if cache.lookup(&id).is_some_and(|cached| cached.ptr_eq(resource)) {
                cache.remove(&id);
                debug!(%resource_type, %id, size = cache.len(), "Evicted");
            }
        }
    }

    /// Live instances for every identifier in `data`, or `None` unless all are cached.
    pub(crate) fn lookup_all(&self, data: &RelationshipData) -> Option<Vec<Resource>> {
        let identifiers = data.identifiers();
        if identifiers.is_empty() {
            return None;
        }
        identifiers
            .into_iter()
            .map(|ident| self.cache_lookup(&ident.resource_type, &ident.id))
            .collect()
    }

    pub fn cached_count(&self, resource_type: &str) -> usize {
        self.inner
            .caches
            .borrow()
            .get(resource_type)
            .map_or(0, ResourceCache::len)
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Returns a fresh cached instance, or fetches and materializes it.
    #[instrument(skip(self))]
    pub async fn find(&self, resource_type: &str, id: &str) -> Result<Resource, StoreError> {
        if let Some(cached) = self.cache_lookup(resource_type, id) {
            if !cached.is_cache_expired() {
                debug!("Cache hit");
                return Ok(cached);
            }
            debug!("Cached resource expired");
        }
        let service = self.service(resource_type)?;
        let payload = service.find_one(id).await?;
        self.push(payload)
    }

    pub async fn find_as<M: ResourceModel>(&self, id: &str) -> Result<M, StoreError> {
        self.find(M::TYPE, id).await.map(M::from_resource)
    }

    /// Fetches a relation's related URL and materializes the result.
    pub(crate) async fn fetch_related(&self, meta: &RelationMeta, url: &str) -> Result<Vec<Resource>, StoreError> {
        let fetch = self.shared_fetch(meta, url)?;
        let result = fetch.clone().await;
        {
            let mut in_flight = self.inner.in_flight.borrow_mut();
            if in_flight.get(url).is_some_and(|current| current.ptr_eq(&fetch)) {
                in_flight.remove(url);
            }
        }
        let resources = self.push_document(result?)?;
        debug!(url, relation = %meta.name, size = resources.len(), "Fetched related");
        Ok(resources)
    }

    fn shared_fetch(&self, meta: &RelationMeta, url: &str) -> Result<SharedFetch, StoreError> {
        let service = self.service(&meta.target_type)?;
        if !self.inner.config.coalesce_fetches {
            return Ok(start_fetch(service, meta.clone(), url.to_owned()));
        }

        let existing = self.inner.in_flight.borrow().get(url).cloned();
        if let Some(fetch) = existing {
            debug!(url, "Joining in-flight fetch");
            return Ok(fetch);
        }
        let fetch = start_fetch(service, meta.clone(), url.to_owned());
        self.inner
            .in_flight
            .borrow_mut()
            .insert(url.to_owned(), fetch.clone());
        Ok(fetch)
    }

    /// Number of related fetches currently in flight.
    pub fn pending_fetches(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Ends the session: drops cached resources, in-flight fetches, services and models.
    pub fn teardown(&self) {
        let caches = std::mem::take(&mut *self.inner.caches.borrow_mut());
        let mut released = 0;
        for cache in caches.values() {
            for resource in cache.all() {
                resource.clear_proxies();
                released += 1;
            }
        }
        let abandoned = {
            let mut in_flight = self.inner.in_flight.borrow_mut();
            let count = in_flight.len();
            in_flight.clear();
            count
        };
        if abandoned > 0 {
            warn!(abandoned, "Teardown with fetches in flight");
        }
        self.inner.services.borrow_mut().clear();
        self.inner.models.borrow_mut().clear();
        info!(released, "Store torn down");
    }
}

fn start_fetch(service: Rc<dyn TypeService>, meta: RelationMeta, url: String) -> SharedFetch {
    async move {
        debug!(%url, relation = %meta.name, "Fetching related");
        service.find_related(&meta, &url).await
    }
    .boxed_local()
    .shared()
}
