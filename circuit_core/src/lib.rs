#![forbid(unsafe_code)]

//! Core domain model and business logic for the Circuit workout system.
//!
//! This crate provides:
//! - Domain types (exercises, feedback, plans, session records)
//! - Catalog management, custom exercises and facet filters
//! - The difficulty model and exercise selection engine
//! - The session runner state machine
//! - Persistence (key-value store, CSV export, snapshots)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod feedback;
pub mod difficulty;
pub mod filter;
pub mod selection;
pub mod calories;
pub mod session;
pub mod history;
pub mod export;
pub mod custom;
pub mod snapshot;
pub mod coach;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, Catalog};
pub use config::Config;
pub use store::{JsonFileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use filter::{Facet, Filters};
pub use selection::{SelectionEngine, SelectionStrategy};
pub use session::{
    ManualTicker, Narrator, Phase, SessionDeps, SessionEvent, SessionObserver, SessionRunner,
    Ticker,
};
pub use history::Stats;
pub use snapshot::{FileSnapshotSync, Snapshot, SnapshotSync};
pub use coach::Coach;
