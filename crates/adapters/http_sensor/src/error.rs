//! Errors raised while setting up the HTTP sensor source.
//!
//! Failures of individual fetches are `EndpointFailure`s, not errors of
//! this type.

/// Errors originating from the HTTP sensor adapter itself.
#[derive(Debug, thiserror::Error)]
pub enum HttpSensorError {
    /// The HTTP client could not be built.
    #[error("unable to build http client")]
    Client(#[from] reqwest::Error),

    /// The configured API key header name is not a valid header name.
    #[error("invalid api key header name {0:?}")]
    InvalidHeader(String),
}
