//! Typed blog models implementing the [`ResourceModel`](crate::schema::ResourceModel) trait.
//!
//! ```text
//! authors ──posts (to-many)──▶ posts ──comments (to-many)──▶ comments ◀──comments (to-many)── commenters
//!    ▲                           │  ▲                            │ │                               ▲
//!    └──────author (to-one)──────┘  └────────post (to-one)───────┘ └──────commenter (to-one)───────┘
//! ```

pub mod author;
pub mod comment;
pub mod commenter;
pub mod post;

pub use author::*;
pub use comment::*;
pub use commenter::*;
pub use post::*;

use crate::lifecycle::Store;

/// Registers every blog model on `store`.
pub fn register_all(store: &Store) {
    store.register::<Post>();
    store.register::<Author>();
    store.register::<Comment>();
    store.register::<Commenter>();
}
