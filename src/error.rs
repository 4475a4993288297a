//! # Store Errors
//!
//! This module defines the common error type used throughout the store.
//! By centralizing error definitions, resources, proxies, caches and services
//! all report failures the same way and callers can pattern match on them.
//!
//! The enum is `Clone` so that a single failed fetch can be handed to every
//! awaiter sharing that fetch.

use crate::schema::RelationKind;

/// Errors that can occur within the store.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StoreError {
    /// The owning store was dropped or torn down.
    #[error("Store closed")]
    StoreClosed,
    /// No model definition is registered for the type.
    #[error("Model not registered: {0}")]
    UnknownModel(String),
    /// No type service is registered for the type.
    #[error("Service not registered: {0}")]
    ServiceNotRegistered(String),
    /// The relation is not statically declared on the model.
    #[error("Relation `{relation}` is not declared on {resource_type}")]
    UnknownRelation {
        resource_type: String,
        relation: String,
    },
    #[error("Relation `{relation}` is {kind}, linkage does not match")]
    KindMismatch { relation: String, kind: RelationKind },
    /// Attempted to change an attribute declared immutable.
    #[error("Attribute `{key}` is immutable on {resource}")]
    ImmutableAttribute { resource: String, key: String },
    /// A non-cached relation has no `links.related` URL to fetch from.
    #[error("Missing related link for `{relation}` on {resource}")]
    MissingRelatedLink { resource: String, relation: String },
    /// Delete was requested twice.
    #[error("Resource already deleted: {0}")]
    AlreadyDeleted(String),
    #[error("Resource is not persisted: {0}")]
    NotPersisted(String),
    #[error("Payload for {found} does not match {expected}")]
    IdentityMismatch { expected: String, found: String },
    #[error("Parent resource released before `{0}` resolved")]
    ResourceReleased(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    /// The external type service failed.
    #[error("Service error: {0}")]
    Service(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidPayload(err.to_string())
    }
}

impl From<String> for StoreError {
    fn from(msg: String) -> Self {
        StoreError::Service(msg)
    }
}
