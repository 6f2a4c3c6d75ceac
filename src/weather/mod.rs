//! Weather fetch operation.
//!
//! One concrete use of the cache policy engine: fetch the current weather
//! for a city from the upstream text provider, validate the status, parse
//! the fixed `city:condition,temperature` line, and hand the result through
//! [`CachePolicy::cached`] keyed on the normalized city. The service holds
//! a policy instance rather than being one, so the engine stays reusable
//! for any other fetchable resource.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::cache::{CachePolicy, CacheStore};
use crate::config::Config;
use crate::error::{ServiceError, WeatherError};
use crate::http::Headers;
use crate::validate::WeatherQuery;

/// A parsed weather lookup result.
///
/// Produced fresh from parsing or reconstituted verbatim from a cache entry;
/// the JSON round-trip through the store is exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub weather_condition: String,
    pub actual_temperature: String,
}

/// Per-request weather service.
///
/// Built from the validated query and the request headers; resolving the
/// cache policy happens here, so malformed `X-Cache-*` headers fail before
/// any network traffic.
pub struct WeatherService {
    city: String,
    policy: CachePolicy,
    store: Arc<dyn CacheStore>,
    pattern: Regex,
    query_url: String,
    timeout: std::time::Duration,
}

impl WeatherService {
    /// Constructs the service for one request.
    ///
    /// The response pattern is anchored to the normalized city:
    /// `^<city>:(.+),(.+)$`, with the city regex-escaped so punctuation in
    /// a city name stays literal.
    ///
    /// # Errors
    ///
    /// A [`CacheError`](crate::error::CacheError) from policy resolution, or
    /// [`WeatherError::Pattern`] if the per-city pattern fails to compile.
    pub fn new(
        query: &WeatherQuery,
        headers: &Headers,
        store: Arc<dyn CacheStore>,
        config: &Config,
    ) -> Result<Self, ServiceError> {
        let policy = CachePolicy::resolve(query.cache(), headers)?;
        let city = query.city().to_owned();

        let pattern = Regex::new(&format!("^{}:(.+),(.+)$", regex::escape(&city))).map_err(
            |source| WeatherError::Pattern {
                city: city.clone(),
                source,
            },
        )?;
        let query_url = format!("{}/{}?format=%l:%C,%t", config.upstream_base, city);

        Ok(Self {
            city,
            policy,
            store,
            pattern,
            query_url,
            timeout: config.upstream_timeout,
        })
    }

    /// The resolved cache policy for this request.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Fetches the weather, cache-aware.
    ///
    /// Returns `(ttl, hit, report)`; the raw upstream call only runs on
    /// bypass or a cache miss.
    pub async fn get_weather(&self) -> Result<(u64, bool, WeatherReport), ServiceError> {
        let city = self.city.clone();
        self.policy
            .cached(self.store.as_ref(), || Some(city), || self.fetch_weather())
            .await
    }

    // The unwrapped fetch: one GET, one attempt, typed failure on every
    // exit path.
    async fn fetch_weather(&self) -> Result<WeatherReport, ServiceError> {
        // Fresh client per call; lookups are rare enough that pooling buys
        // nothing here.
        let client = reqwest::Client::new();
        let response = client
            .get(&self.query_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| {
                error!(city = %self.city, error = %source, "failed to reach weather upstream");
                WeatherError::Unreachable {
                    city: self.city.clone(),
                    source,
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| {
            error!(city = %self.city, error = %source, "failed to read upstream body");
            WeatherError::Unreachable {
                city: self.city.clone(),
                source,
            }
        })?;

        if status.as_u16() != 200 {
            warn!(
                city = %self.city,
                status = status.as_u16(),
                body = %body,
                "weather upstream returned an error status"
            );
            return Err(WeatherError::UpstreamStatus {
                city: self.city.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        Ok(self.parse_report(&body)?)
    }

    // Applies the precompiled pattern; the first match's groups become
    // (condition, temperature).
    fn parse_report(&self, body: &str) -> Result<WeatherReport, WeatherError> {
        let captures = self.pattern.captures(body.trim()).ok_or(WeatherError::Parse {
            city: self.city.clone(),
        })?;
        Ok(WeatherReport {
            city: self.city.clone(),
            weather_condition: captures[1].to_owned(),
            actual_temperature: captures[2].to_owned(),
        })
    }
}
