//! ICP Intelligence client engine.
//!
//! Headless counterpart of the ICP Intelligence dashboard: typed access to
//! the remote data store, the search/enrichment workflow controller, bulk
//! activation, recurring-search scheduling, derived list filtering, and
//! CSV export. All durable state lives in external services; this crate
//! holds only transient, derived copies.

pub mod activation;
pub mod error;
pub mod export;
pub mod filters;
pub mod parser;
pub mod scheduler;
pub mod search;
pub mod state;
pub mod store;
pub mod types;

pub use error::EngineError;
pub use state::AppState;
