//! HTTP surface of the service.
//!
//! One endpoint: `POST /weather/`. The handler validates the body (422 on
//! failure), builds a per-request [`WeatherService`] around the shared
//! store, runs the cache-aware fetch, and renders the report with the
//! cache metadata headers. Typed service errors are not handled here; they
//! propagate to the error boundary.

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::context::Context;
use crate::error::ServiceError;
use crate::router::{HandlerResult, Router};
use crate::validate::WeatherQuery;
use crate::weather::WeatherService;
use crate::{Response, StatusCode};

/// Registers all routes, injecting the process-wide store and config into
/// each handler by closure capture.
pub fn mount(router: &mut Router, store: Arc<dyn CacheStore>, config: Config) {
    router.post("/weather/", move |ctx: Context| {
        let store = Arc::clone(&store);
        let config = config.clone();
        async move { get_weather(ctx, store, &config).await }
    });
}

async fn get_weather(
    ctx: Context,
    store: Arc<dyn CacheStore>,
    config: &Config,
) -> HandlerResult {
    let query = match WeatherQuery::from_body(ctx.request().body()) {
        Ok(query) => query,
        Err(err) => {
            return Response::new(StatusCode::UnprocessableEntity)
                .json(&serde_json::json!({ "error": err.to_string() }))
                .map_err(|e| ServiceError::Internal(e.to_string()));
        }
    };

    let service = WeatherService::new(&query, ctx.request().headers(), store, config)?;
    let (ttl, hit, report) = service.get_weather().await?;

    Response::new(StatusCode::Ok)
        .header("X-Cache-Status", if hit { "HIT" } else { "MISS" })
        .header("X-Cache-TTL", ttl.to_string())
        .json(&report)
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::cache::MemoryStore;
    use crate::middleware::{ErrorBoundary, Pipeline, RequestLogger};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Minimal upstream stub: answers every request on the listener with the
    // given status line and plaintext body, forever.
    async fn spawn_upstream(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf).await;
                    let response = format!(
                        "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn test_pipeline(upstream_base: String) -> Pipeline {
        let config = Config {
            upstream_base,
            ..Config::default()
        };
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let mut router = Router::new();
        mount(&mut router, store, config);
        Pipeline::new(router).with(ErrorBoundary).with(RequestLogger)
    }

    async fn post_weather(pipeline: &Pipeline, body: &str, headers: &[(&str, &str)]) -> String {
        let mut raw = String::from("POST /weather/ HTTP/1.1\r\nHost: localhost\r\n");
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
        let (request, _) = Request::parse(raw.as_bytes()).unwrap();
        let response = pipeline.handle(Context::new(request)).await;
        String::from_utf8(response.into_bytes().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn miss_then_hit_round_trip() {
        let base = spawn_upstream("HTTP/1.1 200 OK", "london:Sunny,+20C").await;
        let pipeline = test_pipeline(base);

        let first = post_weather(&pipeline, r#"{"city":"London"}"#, &[]).await;
        assert!(first.starts_with("HTTP/1.1 200 OK"));
        assert!(first.contains("X-Cache-Status: MISS\r\n"));
        assert!(first.contains("X-Cache-TTL: 3600\r\n"));
        assert!(first.contains(r#""city":"london""#));
        assert!(first.contains(r#""weather_condition":"Sunny""#));
        assert!(first.contains(r#""actual_temperature":"+20C""#));

        let second = post_weather(&pipeline, r#"{"city":"London"}"#, &[]).await;
        assert!(second.starts_with("HTTP/1.1 200 OK"));
        assert!(second.contains("X-Cache-Status: HIT\r\n"));
        // The cached payload round-trips bit-identically.
        let body_of = |s: &str| s.split("\r\n\r\n").nth(1).unwrap().to_owned();
        assert_eq!(body_of(&first), body_of(&second));
    }

    #[tokio::test]
    async fn bypass_header_always_misses() {
        let base = spawn_upstream("HTTP/1.1 200 OK", "london:Sunny,+20C").await;
        let pipeline = test_pipeline(base);

        for _ in 0..2 {
            let response = post_weather(
                &pipeline,
                r#"{"city":"London"}"#,
                &[("X-Cache-Bypass", "yes")],
            )
            .await;
            assert!(response.contains("X-Cache-Status: MISS\r\n"));
        }
    }

    #[tokio::test]
    async fn ttl_header_echoes_in_response() {
        let base = spawn_upstream("HTTP/1.1 200 OK", "london:Sunny,+20C").await;
        let pipeline = test_pipeline(base);

        let response =
            post_weather(&pipeline, r#"{"city":"London"}"#, &[("X-Cache-TTL", "120")]).await;
        assert!(response.contains("X-Cache-TTL: 120\r\n"));
    }

    #[tokio::test]
    async fn malformed_ttl_header_is_400() {
        let pipeline = test_pipeline("http://127.0.0.1:9".into());
        let response =
            post_weather(&pipeline, r#"{"city":"London"}"#, &[("X-Cache-TTL", "soon")]).await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
        assert!(response.contains(r#""error":"X-Cache-TTL value must be a positive integer""#));
    }

    #[tokio::test]
    async fn missing_city_is_422() {
        let pipeline = test_pipeline("http://127.0.0.1:9".into());
        let response = post_weather(&pipeline, r#"{"cache_ttl":5}"#, &[]).await;
        assert!(response.starts_with("HTTP/1.1 422 Unprocessable Entity"));
        assert!(response.contains(r#""error""#));
    }

    #[tokio::test]
    async fn wrong_city_type_is_422() {
        let pipeline = test_pipeline("http://127.0.0.1:9".into());
        let response = post_weather(&pipeline, r#"{"city":123}"#, &[]).await;
        assert!(response.starts_with("HTTP/1.1 422 Unprocessable Entity"));
    }

    #[tokio::test]
    async fn upstream_error_status_is_502() {
        let base = spawn_upstream("HTTP/1.1 503 Service Unavailable", "nope").await;
        let pipeline = test_pipeline(base);
        let response = post_weather(&pipeline, r#"{"city":"London"}"#, &[]).await;
        assert!(response.starts_with("HTTP/1.1 502 Bad Gateway"));
        assert!(response.contains(r#""error":"fail to get a response for london""#));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_502() {
        let pipeline = test_pipeline("http://127.0.0.1:9".into());
        let response = post_weather(&pipeline, r#"{"city":"London"}"#, &[]).await;
        assert!(response.starts_with("HTTP/1.1 502 Bad Gateway"));
    }

    #[tokio::test]
    async fn unparseable_upstream_body_is_500() {
        let base = spawn_upstream("HTTP/1.1 200 OK", "InvalidResponse").await;
        let pipeline = test_pipeline(base);
        let response = post_weather(&pipeline, r#"{"city":"London"}"#, &[]).await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error"));
        assert!(response.contains(r#""error":"fail to parse weather response for london""#));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let pipeline = test_pipeline("http://127.0.0.1:9".into());
        let raw = b"GET /forecast HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (request, _) = Request::parse(raw).unwrap();
        let response = pipeline.handle(Context::new(request)).await;
        assert_eq!(response.status(), StatusCode::NotFound);
    }
}
