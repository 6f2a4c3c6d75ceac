//! # wxproxy
//!
//! A small HTTP service that proxies weather lookups to an upstream
//! text-based weather provider, caches responses in a key-value store, and
//! lets callers steer caching per request through `X-Cache-TTL` and
//! `X-Cache-Bypass` headers or the matching body fields.
//!
//! The interesting part lives in [`cache`]: a policy engine that resolves
//! the effective TTL and bypass flag from the overlapping input sources and
//! wraps any JSON-producing fetch operation with cache semantics. The
//! [`weather`] module is the one concrete fetcher today.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wxproxy::cache::{CacheStore, MemoryStore};
//! use wxproxy::config::Config;
//! use wxproxy::context::Context;
//! use wxproxy::middleware::{ErrorBoundary, Pipeline, RequestLogger};
//! use wxproxy::router::Router;
//! use wxproxy::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
//!
//!     let mut router = Router::new();
//!     wxproxy::routes::mount(&mut router, store, config.clone());
//!     let pipeline = Pipeline::new(router).with(ErrorBoundary).with(RequestLogger);
//!
//!     let server = Server::bind(&config.bind_addr).await?;
//!     server
//!         .run(move |request| {
//!             let pipeline = pipeline.clone();
//!             async move { pipeline.handle(Context::new(request)).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod server;
pub mod validate;
pub mod weather;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use error::{CacheError, ServiceError, WeatherError};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
