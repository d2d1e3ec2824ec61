//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AggregatorError`] via `#[from]` at the port boundary. Per-endpoint and
//! per-rule failures ([`EndpointFailure`](crate::cycle::EndpointFailure),
//! [`ActionSinkFailure`]) are not variants of
//! [`AggregatorError`]: they are recovered at the narrowest scope and never
//! propagate to the scheduling loops.

/// Top-level error returned by ports and application services.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    /// Rejected at registration time; never reaches the runtime loops.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    /// A referenced endpoint or rule does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The durable store could not be reached or refused the operation.
    ///
    /// Fatal to the current cycle or tick, retried by the scheduler.
    #[error("storage unavailable")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AggregatorError {
    /// Whether this error should count against the storage health signal.
    #[must_use]
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Invalid endpoint or rule definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Another endpoint is already registered with this URL.
    #[error("endpoint {url} is already registered")]
    DuplicateEndpoint { url: String },

    /// Another rule already uses this name.
    #[error("rule {name:?} already exists")]
    DuplicateRule { name: String },

    /// A name field was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// The URL could not be parsed as an absolute URI.
    #[error("invalid url {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL parsed but does not use `http` or `https`.
    #[error("unsupported url scheme {scheme:?} in {url:?}")]
    UnsupportedScheme { url: String, scheme: String },

    /// A request timeout of zero would fail every fetch.
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    /// A predicate names no sensor.
    #[error("predicate sensor name must not be empty")]
    EmptySensorName,

    /// A predicate window of zero length selects no data.
    #[error("predicate window must be greater than zero")]
    ZeroWindow,

    /// Thresholds must be finite numbers.
    #[error("predicate threshold must be a finite number")]
    NonFiniteThreshold,

    /// `all` / `any` predicates need at least one member.
    #[error("composite predicate must contain at least one member")]
    EmptyComposite,

    /// A rule was defined without an action.
    #[error("rule must define an action")]
    MissingAction,

    /// An action's payload template does not compile.
    #[error("invalid action template: {message}")]
    InvalidTemplate { message: String },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An action sink could not deliver a firing.
#[derive(Debug, thiserror::Error)]
pub enum ActionSinkFailure {
    /// The payload template could not be rendered.
    #[error("failed to render payload template: {0}")]
    Render(String),

    /// The sink could not be reached.
    #[error("sink transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The sink answered with a non-success status.
    #[error("sink rejected the payload with status {status}")]
    Rejected { status: u16 },

    /// No sink is configured for this kind of action.
    #[error("no sink registered for {kind} actions")]
    Unsupported { kind: &'static str },
}
