//! Request routing — map HTTP method + exact path to handler functions.
//!
//! The proxy exposes a handful of fixed endpoints, so routing is a linear
//! scan over exact patterns. Trailing slashes are normalized on both sides:
//! `/weather` and `/weather/` address the same route. Handlers are fallible;
//! a returned [`ServiceError`] flows up the middleware chain to the error
//! boundary rather than being rendered here.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::ServiceError;
use crate::{Method, Response, StatusCode};

/// A handler's outcome: a response, or a service error for the boundary to
/// translate.
pub type HandlerResult = Result<Response, ServiceError>;

/// Type-erased, heap-allocated async handler.
pub type Handler = Arc<
    dyn Fn(Context) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = HandlerResult> + Send` that is
/// also `Send + Sync + 'static` implements this automatically.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> {
        Box::pin((self)(ctx))
    }
}

// Strips the trailing slash (except on the root) so `/weather/` and
// `/weather` compare equal.
fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.path == normalize(path)
    }
}

/// Dispatches requests to registered handler functions.
///
/// Routes are evaluated in registration order; the first route whose method
/// and path both match wins. When nothing matches, a `404` JSON error
/// response is returned.
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a handler for `GET` requests on `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Registers a handler for `POST` requests on `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    /// Returns the number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `ctx` to the first matching route.
    pub async fn dispatch(&self, ctx: Context) -> HandlerResult {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_owned();

        for route in &self.routes {
            if route.matches(&method, &path) {
                return (route.handler)(ctx).await;
            }
        }

        Ok(Response::new(StatusCode::NotFound)
            .json(&serde_json::json!({ "error": "Not Found" }))
            .unwrap_or_else(|_| Response::new(StatusCode::NotFound)))
    }
}
