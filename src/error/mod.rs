//! Service error taxonomy.
//!
//! Two error families cover everything the request path can fail with:
//!
//! - [`CacheError`] — malformed cache-control headers (client's fault) and
//!   cache wiring mistakes (ours).
//! - [`WeatherError`] — upstream transport or status failures and responses
//!   we cannot parse.
//!
//! Both roll up into [`ServiceError`], which every handler returns. Errors
//! propagate untouched through the fetch/cache call chain; a single boundary
//! (`middleware::ErrorBoundary`) translates them into JSON responses.

use thiserror::Error;

use crate::http::{Response, StatusCode};

/// Errors raised by the cache policy engine.
#[derive(Debug, Error)]
pub enum CacheError {
    /// `X-Cache-TTL` was present but not a positive integer.
    #[error("X-Cache-TTL value must be a positive integer")]
    InvalidTtlHeader,

    /// `X-Cache-Bypass` was present but not a recognized boolean token.
    #[error(
        "X-Cache-Bypass value must be one of: 1, true, yes, on, 0, false, no, off"
    )]
    InvalidBypassHeader,

    /// A fetch operation was wired to the engine without a usable cache key.
    /// This is a programming error, not a client error.
    #[error("incorrect cache key field setup")]
    KeyFieldMisconfigured,

    /// A cache entry could not be encoded or decoded as JSON.
    #[error("failed to encode or decode cache entry: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTtlHeader | Self::InvalidBypassHeader => StatusCode::BadRequest,
            Self::KeyFieldMisconfigured | Self::Codec(_) => StatusCode::InternalServerError,
        }
    }
}

/// Errors raised by the weather fetch operation.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The upstream provider could not be reached (connect, DNS, timeout).
    #[error("fail to get a response for {city}")]
    Unreachable {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream provider answered with a non-200 status.
    #[error("fail to get a response for {city}")]
    UpstreamStatus { city: String, status: u16 },

    /// The upstream body did not match the expected `city:condition,temp` shape.
    #[error("fail to parse weather response for {city}")]
    Parse { city: String },

    /// The per-city response pattern failed to compile.
    #[error("fail to build response pattern for {city}")]
    Pattern {
        city: String,
        #[source]
        source: regex::Error,
    },
}

impl WeatherError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unreachable { .. } | Self::UpstreamStatus { .. } => StatusCode::BadGateway,
            Self::Parse { .. } | Self::Pattern { .. } => StatusCode::InternalServerError,
        }
    }
}

/// Umbrella error returned by route handlers and the cache wrapper.
///
/// The `Internal` variant is the generic fallback for failures outside the
/// two families; its message is never derived from internal error detail.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// The HTTP status this error translates to at the boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Cache(e) => e.status(),
            Self::Weather(e) => e.status(),
            Self::Internal(_) => StatusCode::InternalServerError,
        }
    }

    /// Returns `true` when the failure is ours rather than the client's or
    /// the upstream's. Used to pick the log level at the boundary.
    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::InternalServerError
    }

    /// Renders the error as its JSON response: `{"error": <message>}` with
    /// the carried status.
    pub fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        Response::new(self.status())
            .header("Content-Type", "application/json")
            .body(body)
    }
}
