//! Errors raised at the generation and search service boundaries.

use thiserror::Error;

/// The external service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Generation,
    Search,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Generation => write!(f, "generation service"),
            Service::Search => write!(f, "search service"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{service} returned HTTP {status}: {message}")]
    Api {
        service: Service,
        status: u16,
        message: String,
    },

    #[error("{service} rejected the credentials: {message}")]
    Auth { service: Service, message: String },

    #[error("{service} rate limit exceeded: {message}")]
    RateLimit { service: Service, message: String },

    #[error("{service} rejected the request: {message}")]
    InvalidRequest { service: Service, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Serialization(String),

    /// A structured response that does not parse or validate against its schema.
    #[error("Response does not match schema '{schema}': {message}")]
    Schema { schema: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Classify a non-success HTTP status from `service`.
    pub fn from_status(service: Service, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => Self::InvalidRequest { service, message },
            401 | 403 => Self::Auth { service, message },
            429 => Self::RateLimit { service, message },
            _ => Self::Api {
                service,
                status,
                message,
            },
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn schema(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            schema: schema.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Transient failures that may succeed if the whole run is repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::RateLimit { .. } | Error::Timeout(_) => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn service(&self) -> Option<Service> {
        match self {
            Error::Api { service, .. }
            | Error::Auth { service, .. }
            | Error::RateLimit { service, .. }
            | Error::InvalidRequest { service, .. } => Some(*service),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
