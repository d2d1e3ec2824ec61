//! # aggregator-domain
//!
//! Pure domain model for the sensor aggregator.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Endpoints** (independently owned sensor HTTP services)
//! - Define **Readings** (raw, duck-typed payload values) and **Data points**
//!   (normalized, timestamped, immutable)
//! - Define the **Unit normalizer** that makes heterogeneous sensors comparable
//! - Define **Collection cycles** (one scheduling tick's per-endpoint outcomes)
//! - Define **Rules** (predicate → action with cooldown) and **Firings**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod cycle;
pub mod data_point;
pub mod endpoint;
pub mod firing;
pub mod reading;
pub mod rule;
pub mod unit;
