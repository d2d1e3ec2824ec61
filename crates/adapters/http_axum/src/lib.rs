//! # aggregator-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **management API** (`/api/endpoints`, `/api/rules`) used to
//!   register, enable, disable and edit endpoints and rules at runtime
//! - Serve a read-only **data API** (`/api/data`) over the time-series store
//! - Serve `/health`, reporting the scheduler's health snapshot
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into JSON responses
//!
//! ## Dependency rule
//! Depends on `aggregator-app` (for port traits and services) and
//! `aggregator-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

pub use state::AppState;
