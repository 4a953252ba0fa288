//! Save/restore of outer-router request state around the inner app.
//!
//! The outer router attaches typed state to the request (request IDs,
//! connection info, instrumentation) that its own layers expect to find
//! again once the exchange completes. The inner app is free to drop or
//! replace any of it while it handles the request. The stash captures the
//! full typed extension set before the inner app runs and reinstates it on
//! the outgoing response, overriding whatever the inner app substituted
//! for the same types.
//!
//! The key space is collision-free by construction: `http::Extensions` is
//! keyed by Rust types, never by user-visible names.

use axum::body::Body;
use axum::http::{Extensions, Request};
use axum::response::Response;

/// Captured request bindings for one adapter invocation.
///
/// Exactly one stash exists per delegated request; restoration is
/// unconditional and happens before the outer router resumes.
#[derive(Debug, Clone)]
pub struct StreamStash {
    extensions: Extensions,
}

impl StreamStash {
    /// Record the request's typed bindings. Must run before the wrapper
    /// chain gets a chance to mutate the request.
    pub fn capture(req: &Request<Body>) -> Self {
        Self {
            extensions: req.extensions().clone(),
        }
    }

    /// Copy the recorded bindings onto the response the outer router
    /// resumes with. Entries the inner app set for the same types are
    /// overridden; unrelated entries it added are kept.
    pub fn restore(self, res: &mut Response) {
        res.extensions_mut().extend(self.extensions);
    }
}
