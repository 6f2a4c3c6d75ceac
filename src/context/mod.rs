//! Per-request context handed to route handlers.

use crate::Request;

/// Wraps the parsed request for handler consumption.
///
/// Collaborators like the cache store are injected into handlers at route
/// registration time (closure capture), not through the context, so this
/// stays a thin view over the request.
pub struct Context {
    request: Request,
}

impl Context {
    /// Creates a context from a parsed request.
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    /// Returns the underlying request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Deserializes the request body as JSON into `T`.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
