//! # aggregator-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EndpointRepository` — the endpoint registry's persistence
//!   - `RuleRepository` — CRUD for rules
//!   - `DataPointStore` — append-only time series, queries and aggregations
//!   - `FiringStore` — durable record of rule firings
//!   - `SensorSource` — fetching raw readings from an endpoint
//!   - `ActionSink` — delivering a rule's action
//! - Define **driving/inbound** use-cases:
//!   - `EndpointRegistry` — register, enable, disable, edit, list endpoints
//!   - `RuleService` — create, update, list, toggle rules
//!   - `Collector` — one collection cycle across all enabled endpoints
//!   - `ActionEngine` — one evaluation tick across all enabled rules
//!   - `Scheduler` — the two periodic loops, backoff and health
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `aggregator-domain` only (plus `tokio` for timers and sync
//! primitives, and `futures` for bounded concurrency).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod action_engine;
pub mod collector;
pub mod evaluator;
pub mod ports;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod testing;
