//! Errors raised while setting up the sinks.

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The webhook HTTP client could not be built.
    #[error("unable to build webhook client")]
    Client(#[from] reqwest::Error),
}
