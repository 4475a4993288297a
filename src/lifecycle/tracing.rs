//! # Observability & Tracing
//!
//! This module provides the tracing setup for applications and tests using the store.
//!
//! ## Overview
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Async operations (`Store::find`, `Resource::save`, `Resource::delete`,
//! `RelatedProxy::resolve`) open spans, so nested events show which resource or
//! relation they belong to.
//!
//! - **Structured logging** with `tracing` crate
//! - **Configurable log levels** via `RUST_LOG` environment variable
//! - **Compact format** with the module prefix hidden (`with_target(false)`)
//!
//! ## What Gets Traced
//!
//! - **Store**: Model and service registration, caching, eviction, teardown
//! - **Resources**: Attribute sets, relationship changes, rollback, reconciliation
//! - **Persistence**: Create, update and delete outcomes
//! - **Proxies**: Cache hits, related fetches, resolution failures
//! - **Warnings**: Immutable attribute writes, type mismatches, replaced cache entries
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info cargo test
//!
//! # Attribute and relationship changes
//! RUST_LOG=debug cargo test
//!
//! # Filter to this crate
//! RUST_LOG=jsonapi_store=debug cargo test
//! ```
//!
//! ## Trace Example
//!
//! Resolving a post's comments through its related link, with `RUST_LOG=debug`:
//!
//! ```text
//! DEBUG resolve{relation=comments}: Fetching related url="/posts/1/comments" relation=comments
//! INFO  resolve{relation=comments}: Cached resource=[JSONAPIResource|comments:4] size=1
//! DEBUG resolve{relation=comments}: Fetched related url="/posts/1/comments" relation=comments size=1
//! INFO  resolve{relation=comments}: Resolved resource=[JSONAPIResource|posts:1] relation=comments size=1
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
