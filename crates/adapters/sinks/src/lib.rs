//! # aggregator-adapter-sinks
//!
//! Delivers rule firings to the outside world.
//!
//! ## Responsibilities
//! - Implement `aggregator-app::ports::ActionSink` with [`SinkDispatcher`],
//!   which routes each action descriptor to the matching sink
//! - [`WebhookSink`]: HTTP request with a templated (or JSON) body
//! - [`LogSink`]: templated `tracing` event at the configured level
//! - Render payload templates with [minijinja](https://docs.rs/minijinja)
//!
//! ## Dependency rule
//! Depends on `aggregator-app` (for the port trait) and `aggregator-domain`.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod log;
pub mod templating;
pub mod webhook;

pub use config::SinksConfig;
pub use dispatcher::SinkDispatcher;
pub use error::SinkError;
pub use log::LogSink;
pub use templating::{TemplateContext, TemplateRenderer};
pub use webhook::WebhookSink;
