#![allow(dead_code)]

use jsonapi_store::lifecycle::setup_tracing;
use jsonapi_store::mock::MockService;
use jsonapi_store::model::register_all;
use jsonapi_store::{Identifier, RelationshipData, RelationshipObject, ResourceObject, Store, StoreConfig};
use serde_json::json;

/// A store with the blog models registered.
pub fn blog_store() -> Store {
    blog_store_with(StoreConfig::default())
}

pub fn blog_store_with(config: StoreConfig) -> Store {
    setup_tracing();
    let store = Store::new(config);
    register_all(&store);
    store
}

/// Registers a fresh mock for `resource_type` and returns a handle to it.
pub fn mock_service(store: &Store, resource_type: &str) -> MockService {
    let service = MockService::new();
    store.register_service(resource_type, service.clone());
    service
}

pub fn to_many(resource_type: &str, ids: &[&str]) -> RelationshipObject {
    RelationshipObject {
        data: Some(RelationshipData::ToMany(
            ids.iter().map(|id| Identifier::new(resource_type, id)).collect(),
        )),
        ..RelationshipObject::default()
    }
}

pub fn to_one(resource_type: &str, id: &str) -> RelationshipObject {
    RelationshipObject {
        data: Some(RelationshipData::ToOne(Some(Identifier::new(resource_type, id)))),
        ..RelationshipObject::default()
    }
}

pub fn post_payload(id: &str, title: &str) -> ResourceObject {
    ResourceObject::new("posts", id).with_attributes(json!({ "title": title }))
}

pub fn comment_payload(id: &str, body: &str) -> ResourceObject {
    ResourceObject::new("comments", id).with_attributes(json!({ "body": body }))
}

pub fn author_payload(id: &str, name: &str) -> ResourceObject {
    ResourceObject::new("authors", id).with_attributes(json!({ "name": name }))
}
