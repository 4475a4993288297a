//! # Type Services
//!
//! A [`TypeService`] is the external collaborator that talks to the server for
//! one resource type. The store owns caching and materialization; services only
//! move payloads across the wire.

use crate::error::StoreError;
use crate::identifier::Identifier;
use crate::payload::{PrimaryData, ResourceObject};
use crate::schema::RelationMeta;
use async_trait::async_trait;

/// Transport for a single resource type.
///
/// # Architecture Note
/// Futures are not required to be `Send`: the store runs on a single thread and
/// resources are `Rc` handles.
#[async_trait(?Send)]
pub trait TypeService {
    /// Fetches one resource by id.
    async fn find_one(&self, id: &str) -> Result<ResourceObject, StoreError> {
        Err(StoreError::Service(format!("find_one({id}) is not supported")))
    }

    /// Fetches the resources behind a relation's `related` link.
    async fn find_related(&self, relation: &RelationMeta, url: &str) -> Result<PrimaryData, StoreError>;

    /// Persists a new resource and returns the server's representation.
    async fn create_resource(&self, resource: &ResourceObject) -> Result<ResourceObject, StoreError>;

    /// Persists changes. `None` means the server had nothing to add.
    async fn update_resource(
        &self,
        resource: &ResourceObject,
        include_relationships: &[String],
    ) -> Result<Option<ResourceObject>, StoreError>;

    async fn delete_resource(&self, identifier: &Identifier) -> Result<(), StoreError>;
}
