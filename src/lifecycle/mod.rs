//! Store session and process-level setup.

pub mod store;
pub mod tracing;

pub use self::tracing::setup_tracing;
pub use store::Store;
