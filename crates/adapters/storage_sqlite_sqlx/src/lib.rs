//! # aggregator-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `aggregator-app::ports`
//!   (`EndpointRepository`, `RuleRepository`, `DataPointStore`, `FiringStore`)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Schema
//! The tables are plain enough to be read directly by analysis tooling:
//! `endpoints`, `sensor_values`, `rules` and `action_firings`. Timestamps are
//! fixed-width RFC 3339 text, identifiers are hyphenated UUIDs.
//!
//! ## Dependency rule
//! Depends on `aggregator-app` (for port traits) and `aggregator-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
pub mod data_point_store;
pub mod endpoint_repo;
pub mod error;
pub mod firing_store;
pub mod pool;
pub mod rule_repo;

pub use data_point_store::SqliteDataPointStore;
pub use endpoint_repo::SqliteEndpointRepository;
pub use firing_store::SqliteFiringStore;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
