//! Middleware pipeline and the service's error boundary.
//!
//! The chain carries `Result<Response, ServiceError>` instead of a bare
//! response: handlers raise typed errors at the point of detection and they
//! propagate untouched until [`ErrorBoundary`] — the single place where a
//! [`ServiceError`] becomes a JSON `{"error": ...}` response with the status
//! the error carries. Anything that somehow escapes the boundary is caught
//! by [`Pipeline::handle`], logged in full, and surfaced as a generic 500
//! with no internal detail.
//!
//! Core types:
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain.
//! - [`Pipeline`] — ordered middleware stack terminating in the router.
//! - [`RequestLogger`] — per-request method/path/status/duration line.
//! - [`ErrorBoundary`] — error-to-response translator.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::time::Instant;

use crate::context::Context;
use crate::error::ServiceError;
use crate::Response;
use crate::router::{HandlerResult, Router};

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor and may pass
/// through, short-circuit with their own result, or decorate the downstream
/// result.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(
        &self,
        ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// Consumed by [`Next::run`], so each middleware can forward at most once.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    index: usize,
}

impl Next {
    /// Creates a cursor positioned at the start of the given stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its result.
    ///
    /// An exhausted chain yields an internal error; a correctly assembled
    /// [`Pipeline`] always terminates in the router dispatcher, so hitting
    /// this means the stack was built by hand and built wrong.
    pub async fn run(mut self, ctx: Context) -> HandlerResult {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Err(ServiceError::Internal(
                "no response generated by middleware pipeline".into(),
            ))
        }
    }
}

/// Logs each request's method, path, outcome, and duration.
///
/// Emits one `tracing::info!` line after the downstream layers complete.
/// Errors are logged with their kind and re-raised unchanged; this sits
/// outside the [`ErrorBoundary`] in the default pipeline, so in practice it
/// sees the already-translated response.
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(
        &self,
        ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let path = ctx.request().path().to_string();

            let result = next.run(ctx).await;

            let duration = start.elapsed();
            match &result {
                Ok(response) => {
                    tracing::info!("{} {} - {} ({:?})", method, path, response.status().as_u16(), duration);
                }
                Err(err) => {
                    tracing::info!("{} {} - error: {} ({:?})", method, path, err, duration);
                }
            }

            result
        })
    }
}

/// The single error-to-response dispatcher.
///
/// Translates a [`ServiceError`] from downstream into its JSON response,
/// carrying the error's status and message verbatim. Internal errors are
/// logged at error level with full detail; client and upstream errors at
/// debug level. Always returns `Ok`.
pub struct ErrorBoundary;

impl Middleware for ErrorBoundary {
    fn handle(
        &self,
        ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> {
        Box::pin(async move {
            match next.run(ctx).await {
                Ok(response) => Ok(response),
                Err(err) => {
                    if err.is_internal() {
                        tracing::error!(error = ?err, "request failed");
                    } else {
                        tracing::debug!(error = %err, "request rejected");
                    }
                    Ok(err.into_response())
                }
            }
        })
    }
}

/// An ordered middleware stack terminating in a [`Router`] dispatcher.
///
/// Cheap to clone: the stack holds `Arc`s. One pipeline instance is shared
/// across all connection tasks.
#[derive(Clone)]
pub struct Pipeline {
    stack: Vec<MiddlewareHandler>,
}

impl Pipeline {
    /// Creates a pipeline whose terminal stage dispatches to `router`.
    pub fn new(router: Router) -> Self {
        let router = Arc::new(router);
        let terminal: MiddlewareHandler = Arc::new(move |ctx, _next| {
            let router = Arc::clone(&router);
            Box::pin(async move { router.dispatch(ctx).await })
        });
        Self {
            stack: vec![terminal],
        }
    }

    /// Prepends a middleware; the last one added runs first.
    #[must_use]
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.stack.insert(0, from_middleware(Arc::new(middleware)));
        self
    }

    /// Runs the full chain for one request.
    ///
    /// This is the outermost boundary: an error that escapes every
    /// middleware (including [`ErrorBoundary`], if mounted) is logged and
    /// collapsed into a generic 500 so no internal detail leaks.
    pub async fn handle(&self, ctx: Context) -> Response {
        match Next::new(self.stack.clone()).run(ctx).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = ?err, "unhandled error escaped the pipeline");
                ServiceError::Internal("Internal Server Error".into()).into_response()
            }
        }
    }
}
