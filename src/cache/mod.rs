//! Cache policy engine.
//!
//! Resolves the effective TTL and bypass flag for a request from two
//! overlapping sources — the validated body fields and the `X-Cache-*`
//! headers, headers taking precedence — and wraps arbitrary fetch
//! operations with cache semantics via [`CachePolicy::cached`]. The wrapper
//! is fetch-type-agnostic: anything returning a JSON-serializable value can
//! be cached with it, weather today or any other resource tomorrow.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{CacheError, ServiceError};
use crate::http::Headers;

pub mod store;

pub use store::{CacheStore, MemoryStore};

/// Fallback TTL when neither header nor body specifies one: 1 hour.
pub const DEFAULT_CACHE_TTL: u64 = 60 * 60;

/// Upper bound on any requested TTL: 30 days. Larger values are clamped,
/// not rejected.
pub const MAX_CACHE_TTL: u64 = 60 * 60 * 24 * 30;

const TTL_HEADER: &str = "X-Cache-TTL";
const BYPASS_HEADER: &str = "X-Cache-Bypass";

/// Cache-control fields from the request body, already validated: a present
/// `ttl` is strictly positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Option<u64>,
    pub bypass: Option<bool>,
}

/// The per-request cache decision: effective TTL and bypass flag.
///
/// Computed once at service construction time and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    ttl: u64,
    bypass: bool,
}

impl CachePolicy {
    /// Resolves the policy from body fields and request headers.
    ///
    /// Precedence for each field independently: header, then body field,
    /// then default (`DEFAULT_CACHE_TTL` / no bypass). A present header
    /// always wins, including a falsy bypass. A TTL above [`MAX_CACHE_TTL`]
    /// is clamped with a warning.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidTtlHeader`] if `X-Cache-TTL` is present but not
    /// a positive integer; [`CacheError::InvalidBypassHeader`] if
    /// `X-Cache-Bypass` is present but not a recognized boolean token.
    pub fn resolve(options: &CacheOptions, headers: &Headers) -> Result<Self, CacheError> {
        let ttl = match headers.get(TTL_HEADER) {
            Some(raw) => Some(parse_ttl_header(raw)?),
            None => options.ttl,
        }
        .unwrap_or(DEFAULT_CACHE_TTL);

        let ttl = if ttl > MAX_CACHE_TTL {
            warn!(
                requested = ttl,
                max = MAX_CACHE_TTL,
                "cache TTL exceeds maximum allowed value, clamped"
            );
            MAX_CACHE_TTL
        } else {
            ttl
        };

        let bypass = match headers.get(BYPASS_HEADER) {
            Some(raw) => parse_bypass_header(raw)?,
            None => options.bypass.unwrap_or(false),
        };

        Ok(Self { ttl, bypass })
    }

    /// The effective TTL in seconds, within `[1, MAX_CACHE_TTL]`.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Whether this request skips the cache entirely.
    pub fn bypass(&self) -> bool {
        self.bypass
    }

    /// Wraps `fetch` with cache semantics and runs it.
    ///
    /// `key_of` resolves the cache key from the operation's own request
    /// context; returning `None` means the operation was wired up without a
    /// usable key field, which is a bug, not client input.
    ///
    /// Returns `(ttl, hit, value)`:
    ///
    /// 1. bypass → `fetch` runs, the store is never touched, `hit = false`.
    /// 2. store hit → the entry is decoded as JSON and returned verbatim,
    ///    `hit = true`. No staleness re-check; the store owns expiration.
    /// 3. miss → `fetch` runs, the value is stored with this policy's TTL,
    ///    `hit = false`.
    pub async fn cached<T, K, F, Fut>(
        &self,
        store: &dyn CacheStore,
        key_of: K,
        fetch: F,
    ) -> Result<(u64, bool, T), ServiceError>
    where
        T: Serialize + DeserializeOwned,
        K: FnOnce() -> Option<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        if self.bypass {
            let value = fetch().await?;
            return Ok((self.ttl, false, value));
        }

        let key = key_of().ok_or(CacheError::KeyFieldMisconfigured)?;

        if let Some(raw) = store.get(&key).await {
            let value = serde_json::from_slice(&raw).map_err(CacheError::Codec)?;
            return Ok((self.ttl, true, value));
        }

        let value = fetch().await?;
        let raw = serde_json::to_vec(&value).map_err(CacheError::Codec)?;
        store.set(&key, raw, Duration::from_secs(self.ttl)).await;
        Ok((self.ttl, false, value))
    }
}

fn parse_ttl_header(value: &str) -> Result<u64, CacheError> {
    match value.trim().parse::<u64>() {
        Ok(ttl) if ttl > 0 => Ok(ttl),
        _ => Err(CacheError::InvalidTtlHeader),
    }
}

fn parse_bypass_header(value: &str) -> Result<bool, CacheError> {
    const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];
    const FALSY: [&str; 4] = ["0", "false", "no", "off"];

    let value = value.trim().to_ascii_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        Ok(true)
    } else if FALSY.contains(&value.as_str()) {
        Ok(false)
    } else {
        Err(CacheError::InvalidBypassHeader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut h = Headers::new();
        for (k, v) in pairs {
            h.insert(*k, *v);
        }
        h
    }

    fn policy(options: CacheOptions, pairs: &[(&str, &str)]) -> CachePolicy {
        CachePolicy::resolve(&options, &headers(pairs)).unwrap()
    }

    // ── TTL resolution ───────────────────────────────────────────────────

    #[test]
    fn ttl_defaults_without_header_or_body() {
        let p = policy(CacheOptions::default(), &[]);
        assert_eq!(p.ttl(), DEFAULT_CACHE_TTL);
        assert!(!p.bypass());
    }

    #[test]
    fn ttl_header_values_resolve_exactly() {
        for raw in ["1", "10", "999"] {
            let p = policy(CacheOptions::default(), &[("X-Cache-TTL", raw)]);
            assert_eq!(p.ttl(), raw.parse::<u64>().unwrap());
        }
    }

    #[test]
    fn ttl_from_body_when_no_header() {
        let p = policy(
            CacheOptions {
                ttl: Some(120),
                bypass: None,
            },
            &[],
        );
        assert_eq!(p.ttl(), 120);
    }

    #[test]
    fn ttl_header_overrides_body() {
        let p = policy(
            CacheOptions {
                ttl: Some(1),
                bypass: None,
            },
            &[("X-Cache-TTL", "5")],
        );
        assert_eq!(p.ttl(), 5);
    }

    #[test]
    fn ttl_above_max_is_clamped() {
        let over = (MAX_CACHE_TTL + 100).to_string();
        let p = policy(CacheOptions::default(), &[("X-Cache-TTL", &over)]);
        assert_eq!(p.ttl(), MAX_CACHE_TTL);
    }

    #[test]
    fn body_ttl_above_max_is_clamped_too() {
        let p = policy(
            CacheOptions {
                ttl: Some(MAX_CACHE_TTL + 1),
                bypass: None,
            },
            &[],
        );
        assert_eq!(p.ttl(), MAX_CACHE_TTL);
    }

    #[test]
    fn invalid_ttl_header_is_bad_request() {
        for raw in ["0", "-1", "abc", "1.5", ""] {
            let err =
                CachePolicy::resolve(&CacheOptions::default(), &headers(&[("X-Cache-TTL", raw)]))
                    .unwrap_err();
            assert!(matches!(err, CacheError::InvalidTtlHeader), "value {raw:?}");
        }
    }

    // ── Bypass resolution ────────────────────────────────────────────────

    #[test]
    fn truthy_bypass_tokens() {
        for raw in ["1", "true", "yes", "on", "TRUE", "Yes", "ON"] {
            let p = policy(CacheOptions::default(), &[("X-Cache-Bypass", raw)]);
            assert!(p.bypass(), "value {raw:?}");
        }
    }

    #[test]
    fn falsy_bypass_tokens() {
        for raw in ["0", "false", "no", "off", "FALSE", "No", "OFF"] {
            let p = policy(CacheOptions::default(), &[("X-Cache-Bypass", raw)]);
            assert!(!p.bypass(), "value {raw:?}");
        }
    }

    #[test]
    fn unknown_bypass_token_is_bad_request() {
        let err = CachePolicy::resolve(
            &CacheOptions::default(),
            &headers(&[("X-Cache-Bypass", "maybe")]),
        )
        .unwrap_err();
        assert!(matches!(err, CacheError::InvalidBypassHeader));
    }

    #[test]
    fn bypass_from_body_when_no_header() {
        let p = policy(
            CacheOptions {
                ttl: None,
                bypass: Some(true),
            },
            &[],
        );
        assert!(p.bypass());
    }

    #[test]
    fn falsy_bypass_header_overrides_truthy_body() {
        let p = policy(
            CacheOptions {
                ttl: None,
                bypass: Some(true),
            },
            &[("X-Cache-Bypass", "false")],
        );
        assert!(!p.bypass());
    }

    // ── Cached wrapper ───────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Payload {
        value: u32,
    }

    type BoxedFetch = std::pin::Pin<Box<dyn Future<Output = Result<Payload, ServiceError>> + Send>>;

    fn counting_fetch(calls: Arc<AtomicUsize>) -> impl FnOnce() -> BoxedFetch {
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Payload { value: 42 })
            })
        }
    }

    #[tokio::test]
    async fn miss_then_hit_fetches_once() {
        let store = MemoryStore::new();
        let p = policy(
            CacheOptions {
                ttl: Some(60),
                bypass: None,
            },
            &[],
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let (ttl, hit, first) = p
            .cached(&store, || Some("k1".into()), counting_fetch(calls.clone()))
            .await
            .unwrap();
        assert_eq!((ttl, hit), (60, false));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);

        let (ttl, hit, second): (u64, bool, Payload) = p
            .cached(&store, || Some("k1".into()), counting_fetch(calls.clone()))
            .await
            .unwrap();
        assert_eq!((ttl, hit), (60, true));
        assert_eq!(second, first);
        // Second call served from the store: zero additional fetches.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bypass_skips_read_and_write() {
        let store = MemoryStore::new();
        store
            .set("k1", b"{\"value\":7}".to_vec(), Duration::from_secs(60))
            .await;
        let p = policy(
            CacheOptions {
                ttl: Some(60),
                bypass: Some(true),
            },
            &[],
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let (ttl, hit, value) = p
            .cached(&store, || Some("k1".into()), counting_fetch(calls.clone()))
            .await
            .unwrap();
        assert_eq!((ttl, hit), (60, false));
        // The pre-seeded entry was ignored and left untouched.
        assert_eq!(value, Payload { value: 42 });
        assert_eq!(store.get("k1").await, Some(b"{\"value\":7}".to_vec()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_key_field_is_internal_error() {
        let store = MemoryStore::new();
        let p = policy(CacheOptions::default(), &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = p
            .cached(&store, || None, counting_fetch(calls.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "incorrect cache key field setup");
        assert!(err.is_internal());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_entry_is_internal_error() {
        let store = MemoryStore::new();
        store
            .set("k1", b"not json".to_vec(), Duration::from_secs(60))
            .await;
        let p = policy(CacheOptions::default(), &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = p
            .cached::<Payload, _, _, _>(&store, || Some("k1".into()), counting_fetch(calls))
            .await
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn fetch_error_propagates_and_writes_nothing() {
        let store = MemoryStore::new();
        let p = policy(CacheOptions::default(), &[]);

        let err = p
            .cached::<Payload, _, _, _>(
                &store,
                || Some("k1".into()),
                || async { Err(ServiceError::Internal("fetch blew up".into())) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
        assert!(store.is_empty());
    }
}
