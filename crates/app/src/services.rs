//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod endpoint_registry;
pub mod rule_service;

pub use endpoint_registry::EndpointRegistry;
pub use rule_service::RuleService;
