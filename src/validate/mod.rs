//! Request body validation models.
//!
//! Mirrors the wire schema of `POST /weather/`: a required `city` plus the
//! optional cache-control fields. Validation failures surface as 422 at the
//! route, before any service object is constructed.

use serde::Deserialize;
use thiserror::Error;

use crate::cache::CacheOptions;

/// A request body that failed validation. Rendered as a 422 JSON error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid request body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("cache_ttl must be a positive integer")]
    NonPositiveTtl,
}

// Raw wire shape; serde rejects a missing city, wrong types, and unknown
// numeric shapes (negative or fractional cache_ttl) before we ever look at
// the values.
#[derive(Debug, Deserialize)]
struct RawWeatherBody {
    city: String,
    cache_ttl: Option<u64>,
    cache_bypass: Option<bool>,
}

/// A validated weather lookup request.
///
/// The city is normalized to lowercase on construction; normalization is
/// total and idempotent, so the cache key derived from it is stable across
/// repeated requests for the same city in any letter case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    city: String,
    cache: CacheOptions,
}

impl WeatherQuery {
    /// Parses and validates a JSON request body.
    ///
    /// # Errors
    ///
    /// [`ValidationError::Malformed`] when the body is not JSON, `city` is
    /// missing or not a string, or a field has the wrong type;
    /// [`ValidationError::NonPositiveTtl`] when `cache_ttl` is zero.
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationError> {
        let raw: RawWeatherBody = serde_json::from_slice(body)?;
        if raw.cache_ttl == Some(0) {
            return Err(ValidationError::NonPositiveTtl);
        }
        Ok(Self {
            city: raw.city.to_lowercase(),
            cache: CacheOptions {
                ttl: raw.cache_ttl,
                bypass: raw.cache_bypass,
            },
        })
    }

    /// The normalized (lowercased) city name.
    pub fn city(&self) -> &str {
        &self.city
    }

    /// The validated cache-control fields.
    pub fn cache(&self) -> &CacheOptions {
        &self.cache
    }
}
