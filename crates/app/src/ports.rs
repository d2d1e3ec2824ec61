//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod action_sink;
pub mod data_store;
pub mod endpoint_repo;
pub mod firing_store;
pub mod rule_repo;
pub mod sensor_source;

pub use action_sink::{ActionSink, FiringContext};
pub use data_store::{AppendReport, DataPointStore};
pub use endpoint_repo::EndpointRepository;
pub use firing_store::FiringStore;
pub use rule_repo::RuleRepository;
pub use sensor_source::SensorSource;
