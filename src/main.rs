//! Service binary: wires logging, config, the shared store, and the
//! middleware pipeline, then runs the server until terminated.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wxproxy::cache::{CacheStore, MemoryStore};
use wxproxy::config::Config;
use wxproxy::context::Context;
use wxproxy::middleware::{ErrorBoundary, Pipeline, RequestLogger};
use wxproxy::router::Router;
use wxproxy::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    tracing::info!(
        addr = %config.bind_addr,
        upstream = %config.upstream_base,
        "starting wxproxy"
    );

    // The one process-wide mutable resource; every request-scoped service
    // receives a handle instead of reaching for a global.
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());

    let mut router = Router::new();
    wxproxy::routes::mount(&mut router, store, config.clone());
    let pipeline = Pipeline::new(router).with(ErrorBoundary).with(RequestLogger);

    let server = Server::bind(&config.bind_addr).await?;
    server
        .run(move |request| {
            let pipeline = pipeline.clone();
            async move { pipeline.handle(Context::new(request)).await }
        })
        .await?;

    Ok(())
}
