mod common;

use common::*;
use jsonapi_store::mock::MockCall;
use jsonapi_store::model::Post;
use jsonapi_store::{PrimaryData, ResourceModel, StoreConfig, StoreError};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_find_fetches_then_serves_from_cache() {
    let store = blog_store();
    let posts = mock_service(&store, "posts");
    posts.expect_find_one("1").return_ok(post_payload("1", "Hello"));

    let first = store.find("posts", "1").await.unwrap();
    let second = store.find("posts", "1").await.unwrap();

    assert!(first.ptr_eq(&second));
    assert!(first.cached_at().is_some());
    assert_eq!(posts.calls(), vec![MockCall::FindOne("1".into())]);
    posts.verify();
}

#[tokio::test]
async fn test_find_refetches_expired_resource() {
    let store = blog_store_with(StoreConfig::default().with_cache_duration(Duration::ZERO));
    let posts = mock_service(&store, "posts");
    posts.expect_find_one("1").return_ok(post_payload("1", "Hello"));
    posts.expect_find_one("1").return_ok(post_payload("1", "Updated"));

    let first = store.find("posts", "1").await.unwrap();
    let second = store.find("posts", "1").await.unwrap();

    // Same live instance, refreshed in place
    assert!(first.ptr_eq(&second));
    assert_eq!(first.attr::<String>("title").as_deref(), Some("Updated"));
    assert_eq!(posts.call_count(), 2);
}

#[tokio::test]
async fn test_find_as_wraps_model() {
    let store = blog_store();
    let posts = mock_service(&store, "posts");
    posts.expect_find_one("1").return_ok(post_payload("1", "Typed"));

    let post = store.find_as::<Post>("1").await.unwrap();

    assert_eq!(post.title().as_deref(), Some("Typed"));
    assert_eq!(post.resource().resource_type(), Post::TYPE);
}

#[tokio::test]
async fn test_find_without_service() {
    let store = blog_store();

    let result = store.find("posts", "1").await;

    assert_eq!(result.unwrap_err(), StoreError::ServiceNotRegistered("posts".into()));
}

#[tokio::test]
async fn test_push_reuses_live_instance() {
    let store = blog_store();
    let first = store.push(post_payload("1", "Hello")).unwrap();
    let second = store.push(post_payload("1", "Server edit")).unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(first.attr::<String>("title").as_deref(), Some("Server edit"));
    assert_eq!(store.cached_count("posts"), 1);
}

#[tokio::test]
async fn test_repush_of_clean_instance_stays_clean() {
    let store = blog_store();
    let post = store.push(post_payload("1", "Hello")).unwrap();

    store
        .push(post_payload("1", "Hello").with_relationship("comments", to_many("comments", &["4"])))
        .unwrap();

    assert!(!post.is_dirty());
    assert!(post.changed_attributes().is_empty());
    assert!(post.changed_relationships().is_empty());
    assert_eq!(post.related_ids("comments"), vec!["4"]);
}

#[tokio::test]
async fn test_push_keeps_local_changes() {
    let store = blog_store();
    let post = store.push(post_payload("1", "Hello")).unwrap();
    post.set_attribute("title", "Local edit").unwrap();

    store.push(post_payload("1", "Server edit")).unwrap();

    assert_eq!(post.attr::<String>("title").as_deref(), Some("Local edit"));
    assert!(post.is_dirty());
}

#[tokio::test]
async fn test_push_rejects_unknown_type() {
    let store = blog_store();

    let result = store.push(jsonapi_store::ResourceObject::new("tags", "1"));

    assert_eq!(result.unwrap_err(), StoreError::UnknownModel("tags".into()));
}

#[tokio::test]
async fn test_push_document_from_json() {
    let store = blog_store();
    let document: PrimaryData = serde_json::from_value(json!([
        { "type": "comments", "id": 4, "attributes": { "body": "a" } },
        { "type": "comments", "id": "5", "attributes": { "body": "b" } }
    ]))
    .unwrap();

    let comments = store.push_document(document).unwrap();

    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].id().as_deref(), Some("4"));
    let ids: Vec<String> = store.peek_all("comments").iter().filter_map(|c| c.id()).collect();
    assert_eq!(ids, vec!["4", "5"]);
}

#[tokio::test]
async fn test_new_resources_are_not_cached() {
    let store = blog_store();
    let post = store.build("posts").unwrap();

    assert!(store.cache_resource(&post).is_err());
    assert_eq!(store.cached_count("posts"), 0);
}

#[tokio::test]
async fn test_model_cache_duration_override() {
    let store = blog_store();
    store.register_model(
        Post::definition().with_cache_duration(chrono::Duration::milliseconds(1_000)),
    );

    let post = store.push(post_payload("1", "Hello")).unwrap();

    assert_eq!(post.cache_duration(), chrono::Duration::milliseconds(1_000));
}

#[tokio::test]
async fn test_teardown_ends_session() {
    let store = blog_store();
    let _posts = mock_service(&store, "posts");
    let comment = store.push(comment_payload("4", "a")).unwrap();
    let post = store
        .push(post_payload("1", "Hello").with_relationship("comments", to_many("comments", &["4"])))
        .unwrap();
    post.related("comments").unwrap().resolve().await.unwrap();

    store.teardown();

    assert_eq!(store.cached_count("posts"), 0);
    assert!(store.peek("comments", "4").is_none());
    assert_eq!(store.model("posts").unwrap_err(), StoreError::UnknownModel("posts".into()));
    assert!(store.service("posts").is_err());
    assert_eq!(comment.id().as_deref(), Some("4"));
}

#[tokio::test]
async fn test_dropped_store_closes_resources() {
    let store = blog_store();
    let post = store.build("posts").unwrap();
    drop(store);

    assert_eq!(post.related("comments").unwrap().resolve().await.unwrap().len(), 0);
    assert_eq!(post.save().await, Err(StoreError::StoreClosed));
}
