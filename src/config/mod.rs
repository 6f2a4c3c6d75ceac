//! Environment-derived service configuration.

use std::env;
use std::time::Duration;

use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_UPSTREAM_BASE: &str = "https://wttr.in";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration, read once at startup and passed by value into
/// route registration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (`WXPROXY_ADDR`).
    pub bind_addr: String,
    /// Base URL of the upstream weather provider (`WXPROXY_UPSTREAM`).
    pub upstream_base: String,
    /// Per-call upstream timeout (`WXPROXY_UPSTREAM_TIMEOUT_SECS`).
    pub upstream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            upstream_base: DEFAULT_UPSTREAM_BASE.to_owned(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Builds a config from environment variables, falling back to defaults
    /// for anything unset. An unparseable timeout falls back with a warning
    /// rather than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env::var("WXPROXY_ADDR").unwrap_or(defaults.bind_addr);
        let upstream_base = env::var("WXPROXY_UPSTREAM")
            .map(|s| s.trim_end_matches('/').to_owned())
            .unwrap_or(defaults.upstream_base);
        let upstream_timeout = match env::var("WXPROXY_UPSTREAM_TIMEOUT_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "invalid WXPROXY_UPSTREAM_TIMEOUT_SECS, using default");
                    defaults.upstream_timeout
                }
            },
            Err(_) => defaults.upstream_timeout,
        };

        Self {
            bind_addr,
            upstream_base,
            upstream_timeout,
        }
    }
}
