mod common;

use common::*;
use jsonapi_store::mock::MockCall;
use jsonapi_store::payload::Links;
use jsonapi_store::{
    PrimaryData, ProxyState, RelationshipObject, ResourceObject, StoreConfig, StoreError,
};

fn with_link(url: &str) -> RelationshipObject {
    RelationshipObject {
        links: Some(Links::from([("related".to_string(), url.to_string())])),
        ..RelationshipObject::default()
    }
}

fn post_with_comments_link(id: &str) -> ResourceObject {
    post_payload(id, "Hello").with_related_link("comments", format!("/posts/{id}/comments"))
}

#[tokio::test]
async fn test_resolves_from_cache_without_fetch() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    store.push(comment_payload("4", "a")).unwrap();
    store.push(comment_payload("5", "b")).unwrap();
    let post = store
        .push(post_payload("1", "Hello").with_relationship("comments", to_many("comments", &["4", "5"])))
        .unwrap();

    let proxy = post.related("comments").unwrap();
    assert!(proxy.is_pending());

    let content = proxy.resolve().await.unwrap();

    assert_eq!(content.ids(), vec!["4", "5"]);
    assert!(proxy.is_resolved());
    assert_eq!(comments.call_count(), 0);
    // Cached instances are handed out, not copies
    assert!(content.resources()[0].ptr_eq(&store.peek("comments", "4").unwrap()));
}

#[tokio::test]
async fn test_fetches_through_related_link() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    comments.expect_find_related("/posts/1/comments").return_ok(PrimaryData::Collection(vec![
        comment_payload("4", "a"),
        comment_payload("5", "b"),
    ]));
    let post = store.push(post_with_comments_link("1")).unwrap();

    let content = post.related("comments").unwrap().resolve().await.unwrap();

    assert_eq!(content.ids(), vec!["4", "5"]);
    assert_eq!(post.related_ids("comments"), vec!["4", "5"]);
    assert!(store.peek("comments", "4").is_some());
    assert_eq!(
        comments.calls(),
        vec![MockCall::FindRelated {
            relation: "comments".into(),
            url: "/posts/1/comments".into(),
        }]
    );
    comments.verify();
}

#[tokio::test]
async fn test_fetched_membership_is_not_a_local_change() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    comments.expect_find_related("/posts/1/comments").return_ok(PrimaryData::Collection(vec![
        comment_payload("4", "a"),
        comment_payload("5", "b"),
    ]));
    let post = store.push(post_with_comments_link("1")).unwrap();

    post.related("comments").unwrap().resolve().await.unwrap();

    assert!(!post.is_dirty());
    assert!(post.changed_relationships().is_empty());
    assert_eq!(post.related_ids("comments"), vec!["4", "5"]);

    post.rollback().unwrap();
    assert_eq!(post.related_ids("comments"), vec!["4", "5"]);
    comments.verify();
}

#[tokio::test]
async fn test_fetched_to_one_is_not_a_local_change() {
    let store = blog_store();
    let posts = mock_service(&store, "posts");
    posts
        .expect_find_related("/comments/4/post")
        .return_ok(PrimaryData::Single(Some(post_payload("1", "Hello"))));
    let comment = store
        .push(comment_payload("4", "a").with_related_link("post", "/comments/4/post"))
        .unwrap();

    comment.related("post").unwrap().resolve().await.unwrap();

    assert!(!comment.is_dirty());
    comment.rollback().unwrap();
    assert_eq!(comment.related_ids("post"), vec!["1"]);
}

#[tokio::test]
async fn test_partial_cache_falls_back_to_fetch() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    store.push(comment_payload("4", "a")).unwrap();
    comments.expect_find_related("/posts/1/comments").return_ok(PrimaryData::Collection(vec![
        comment_payload("4", "a"),
        comment_payload("5", "b"),
    ]));
    let post = store
        .push(post_payload("1", "Hello").with_relationship(
            "comments",
            RelationshipObject {
                data: to_many("comments", &["4", "5"]).data,
                ..with_link("/posts/1/comments")
            },
        ))
        .unwrap();

    let content = post.related("comments").unwrap().resolve().await.unwrap();

    assert_eq!(content.len(), 2);
    assert_eq!(comments.call_count(), 1);
}

#[tokio::test]
async fn test_to_one_proxy_fetch() {
    let store = blog_store();
    let posts = mock_service(&store, "posts");
    posts
        .expect_find_related("/comments/4/post")
        .return_ok(PrimaryData::Single(Some(post_payload("1", "Hello"))));
    let comment = store
        .push(comment_payload("4", "a").with_related_link("post", "/comments/4/post"))
        .unwrap();

    let content = comment.related("post").unwrap().resolve().await.unwrap();

    assert_eq!(content.first().and_then(|post| post.id()).as_deref(), Some("1"));
    assert_eq!(comment.related_ids("post"), vec!["1"]);
}

#[tokio::test]
async fn test_missing_related_link_fails_fast() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    let post = store.push(post_payload("1", "Hello")).unwrap();

    let proxy = post.related("comments").unwrap();
    let result = proxy.resolve().await;

    assert_eq!(
        result,
        Err(StoreError::MissingRelatedLink {
            resource: "[JSONAPIResource|posts:1]".into(),
            relation: "comments".into(),
        })
    );
    assert!(proxy.is_failed());
    assert_eq!(comments.call_count(), 0);
}

#[tokio::test]
async fn test_failed_fetch_is_terminal() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    comments
        .expect_find_related("/posts/1/comments")
        .return_err(StoreError::Service("offline".into()));
    let post = store.push(post_with_comments_link("1")).unwrap();

    let proxy = post.related("comments").unwrap();
    let first = proxy.resolve().await;
    let second = proxy.resolve().await;

    assert_eq!(first, Err(StoreError::Service("offline".into())));
    assert_eq!(second, first);
    assert_eq!(proxy.state(), ProxyState::Failed(StoreError::Service("offline".into())));
    assert_eq!(comments.call_count(), 1);

    // Asking again builds a fresh proxy that may retry
    comments
        .expect_find_related("/posts/1/comments")
        .return_ok(PrimaryData::Collection(vec![comment_payload("4", "a")]));
    let retry = post.related("comments").unwrap();
    assert!(retry.is_pending());
    assert_eq!(retry.resolve().await.unwrap().ids(), vec!["4"]);
    comments.verify();
}

#[tokio::test]
async fn test_new_parent_proxy_is_resolved_and_empty() {
    let store = blog_store();
    let post = store.build("posts").unwrap();

    let proxy = post.related("comments").unwrap();

    assert!(proxy.is_resolved());
    assert!(proxy.resolve().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_related_returns_live_proxy() {
    let store = blog_store();
    let post = store.push(post_payload("1", "Hello")).unwrap();

    let first = post.related("comments").unwrap();
    let second = post.related("comments").unwrap();
    assert_eq!(first.relation(), "comments");

    // Both handles share one state machine
    assert!(first.resolve().await.is_err());
    assert!(second.is_failed());

    // A failed proxy is replaced on the next request
    let third = post.related("comments").unwrap();
    assert!(third.is_pending());
}

#[tokio::test]
async fn test_live_proxy_follows_mutations() {
    let store = blog_store();
    let _comments = mock_service(&store, "comments");
    for id in ["4", "5", "6"] {
        store.push(comment_payload(id, "text")).unwrap();
    }
    let post = store
        .push(post_payload("1", "Hello").with_relationship("comments", to_many("comments", &["4", "5"])))
        .unwrap();
    let proxy = post.related("comments").unwrap();
    proxy.resolve().await.unwrap();

    post.add_relationship("comments", "6").unwrap();
    assert_eq!(proxy.content().ids(), vec!["4", "5", "6"]);

    post.remove_relationship("comments", "4").unwrap();
    assert_eq!(proxy.content().ids(), vec!["5", "6"]);

    post.rollback().unwrap();
    assert_eq!(proxy.content().len(), 2);
    assert_eq!(post.related_ids("comments"), vec!["4", "5"]);
}

#[tokio::test]
async fn test_destroyed_resource_detaches_from_proxy() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    store.push(comment_payload("4", "a")).unwrap();
    store.push(comment_payload("5", "b")).unwrap();
    let post = store
        .push(post_payload("1", "Hello").with_relationship("comments", to_many("comments", &["4", "5"])))
        .unwrap();
    let proxy = post.related("comments").unwrap();
    proxy.resolve().await.unwrap();

    comments.expect_delete("4").return_ok();
    store.peek("comments", "4").unwrap().delete().await.unwrap();

    assert_eq!(proxy.content().ids(), vec!["5"]);
    assert!(store.peek("comments", "4").is_none());
    comments.verify();
}

#[tokio::test]
async fn test_concurrent_resolutions_share_one_fetch() {
    let store = blog_store();
    let comments = mock_service(&store, "comments");
    comments
        .expect_find_related("/posts/1/comments")
        .return_ok(PrimaryData::Collection(vec![comment_payload("4", "a")]));
    let post = store.push(post_with_comments_link("1")).unwrap();
    let proxy = post.related("comments").unwrap();

    let (first, second) = tokio::join!(proxy.resolve(), proxy.resolve());

    assert_eq!(first.unwrap().ids(), vec!["4"]);
    assert_eq!(second.unwrap().ids(), vec!["4"]);
    assert_eq!(comments.call_count(), 1);
    assert_eq!(store.pending_fetches(), 0);
}

#[tokio::test]
async fn test_coalescing_can_be_disabled() {
    let store = blog_store_with(StoreConfig::default().with_coalescing(false));
    let comments = mock_service(&store, "comments");
    for _ in 0..2 {
        comments
            .expect_find_related("/posts/1/comments")
            .return_ok(PrimaryData::Collection(vec![comment_payload("4", "a")]));
    }
    let post = store.push(post_with_comments_link("1")).unwrap();
    let proxy = post.related("comments").unwrap();

    let (first, second) = tokio::join!(proxy.resolve(), proxy.resolve());

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(comments.call_count(), 2);
    assert_eq!(proxy.content().len(), 1);
    comments.verify();
}
