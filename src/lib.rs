//! # JSON:API Store
//!
//! > **A client-side data layer for JSON:API resources.**
//!
//! This crate keeps an in-memory model of server resources: attribute bags,
//! relationship slots, change tracking, lazily resolved related collections and
//! a per-type identity cache.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One live instance per `(type, id)`
//! Every payload is materialized through the [`Store`], which caches persisted
//! resources per type. Fetching a resource twice, or finding it through a
//! relationship, yields the same live instance, so a change made in one place
//! is visible everywhere.
//!
//! ### Deltas, not snapshots
//! Resources record what changed since the last reconciliation with the server.
//! `changed_attributes`, `changed_relationships` and `is_dirty` are computed
//! from those deltas on read, and `rollback` replays them backwards.
//!
//! ## 🚀 Core Concepts
//!
//! ### Inverse relationships
//! Relations may declare an inverse on the target type. Adding `comments: 4` to
//! `posts:1` also sets `post: 1` on comment `4` when it is live. The direction
//! is explicit ([`Propagation::Forward`] vs [`Propagation::InverseOnly`]), so
//! the mirrored call never bounces back.
//!
//! ### Related proxies
//! [`RelatedProxy`] stands in for a relation's resources. It resolves from the
//! cache when every referenced id is live, otherwise through the relation's
//! `links.related` URL.
//!
//! ### Mocking: Testing without a server
//! [`TypeService`] is the only seam to the network. [`MockService`](mock::MockService)
//! implements it over a queue of expectations. See the [`mock`] module.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Single-threaded handles
//! [`Resource`], [`RelatedProxy`] and [`Store`] are `Rc` handles with interior
//! mutability. Run the store on one thread (a current-thread Tokio runtime or a
//! `LocalSet`). Service futures are not required to be `Send`.
//!
//! ### 2. Type-Safe Error Handling
//! All fallible operations return [`StoreError`]. It is `Clone`, so a failed
//! fetch can be stored in a proxy and shared between coalesced awaiters.
//!
//! ### 3. Explicit lifecycle
//! The store is created and torn down by the application. Resources only hold a
//! weak reference to it; [`Store::teardown`] releases cached resources and the
//! proxies linking them.
//!
//! ### 4. Observability
//! We use `tracing` everywhere with structured logging.
//! See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`identifier`], [`payload`], [`schema`])
//! - **Role**: Wire shapes and static model metadata.
//! - **Key items**: [`Identifier`], [`ResourceObject`], [`ModelDefinition`].
//!
//! ### 2. The Entity ([`resource`], [`tracking`])
//! - **Role**: Mutation API, change tracking, rollback, persistence.
//! - **Key items**: [`Resource`], [`AttributeTracker`](tracking::AttributeTracker),
//!   [`RelationshipTracker`](tracking::RelationshipTracker).
//!
//! ### 3. The Session ([`lifecycle`], [`cache`], [`proxy`])
//! - **Role**: Model factory, identity cache, related resolution.
//! - **Key items**: [`Store`], [`ResourceCache`](cache::ResourceCache), [`RelatedProxy`].
//!
//! ### 4. The Implementation ([`model`])
//! Sample blog models (`posts`, `authors`, `comments`, `commenters`) built on
//! [`ResourceModel`].
//!
//! ## 🚀 Quick Start
//!
//! ```ignore
//! let store = Store::new(StoreConfig::default());
//! model::register_all(&store);
//! store.register_service("posts", posts_service);
//! store.register_service("comments", comments_service);
//!
//! let post = store.find_as::<Post>("1").await?;
//! post.set_title("Hello")?;
//! let comments = post.comments()?.resolve().await?;
//! post.resource().save().await?;
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod mock;
pub mod model;
pub mod payload;
pub mod proxy;
pub mod resource;
pub mod schema;
pub mod service;
pub mod tracking;

pub use config::StoreConfig;
pub use error::StoreError;
pub use identifier::Identifier;
pub use lifecycle::Store;
pub use payload::{PrimaryData, RelationshipData, RelationshipObject, RelationshipSlot, ResourceObject};
pub use proxy::{ProxyContent, ProxyState, RelatedProxy};
pub use resource::{Propagation, RelatedIds, RelatedRef, Resource};
pub use schema::{AttrType, ModelDefinition, RelationKind, RelationMeta, ResourceModel};
pub use service::TypeService;
