//! # aggregator-adapter-http-sensor
//!
//! Fetches sensor readings from endpoints over HTTP using
//! [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement `aggregator-app::ports::SensorSource`
//! - Authenticate with the endpoint's API key header when one is configured
//! - Decode both payload shapes endpoints are known to serve (see [`payload`])
//! - Report every transport, status and decoding problem as an
//!   `EndpointFailure` so the collector can isolate it
//!
//! ## Dependency rule
//! Depends on `aggregator-app` (for the port trait) and `aggregator-domain`.

pub mod config;
pub mod error;
pub mod payload;
pub mod source;

pub use config::HttpSensorConfig;
pub use error::HttpSensorError;
pub use source::HttpSensorSource;
