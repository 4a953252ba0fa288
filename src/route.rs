//! Route pattern analysis and per-request route context.
//!
//! # Responsibilities
//! - Recognize the `sub_path` wildcard capture in route patterns
//! - Decide whether the path rewrite step applies to a route
//! - Derive the captured remainder and query for one request
//!
//! # Design Decisions
//! - Patterns are parsed once at registration, immutable afterwards
//! - Context travels as a typed request extension, never a hidden key
//! - The captured remainder is passed through byte-for-byte (no decoding)
//! - An absent capture and a root match both resolve to the empty segment
//! - Nested routes receive prefix-stripped URIs from the router, so the
//!   capture is cut against the pattern's own static part, never against
//!   the nest prefix

use axum::body::Body;
use axum::http::Request;

/// Name of the wildcard capture parameter recognized in route patterns.
pub const SUB_PATH_PARAM: &str = "sub_path";

/// The catch-all pattern registered by the convenience facade at the root.
pub const CATCH_ALL_PATTERN: &str = "/{*sub_path}";

/// A route pattern, parsed once when the handler is built.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pattern: String,
    /// Static pattern text before the capture token, ending in `/`.
    wildcard_prefix: Option<String>,
    /// Mount prefix the registering facade placed in front of the route,
    /// still present in the URI at dispatch. Empty for routes registered
    /// without one (including routes inside `nest`, where the router strips
    /// the prefix before the handler runs).
    mount_prefix: String,
}

impl RouteSpec {
    /// Parse a route pattern, detecting the `sub_path` capture token.
    /// Recognized forms are `{*sub_path}` (greedy) and `{sub_path}`
    /// (single segment).
    pub fn parse(pattern: &str) -> Self {
        let greedy = format!("{{*{SUB_PATH_PARAM}}}");
        let single = format!("{{{SUB_PATH_PARAM}}}");
        let token_at = pattern
            .find(greedy.as_str())
            .or_else(|| pattern.find(single.as_str()));

        Self {
            pattern: pattern.to_string(),
            wildcard_prefix: token_at.map(|at| pattern[..at].to_string()),
            mount_prefix: String::new(),
        }
    }

    /// Parse a pattern registered under an explicit mount prefix. The
    /// prefix is part of the URI the handler receives and gets stripped
    /// before the inner app sees the path.
    pub(crate) fn with_mount_prefix(pattern: &str, prefix: &str) -> Self {
        let mut spec = Self::parse(pattern);
        spec.mount_prefix = prefix.trim_end_matches('/').to_string();
        spec
    }

    /// The pattern this route was registered under.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Mount prefix still present in dispatched URIs; empty when none.
    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// Whether the pattern contains the wildcard capture at all.
    pub fn has_wildcard(&self) -> bool {
        self.wildcard_prefix.is_some()
    }

    /// The rewrite step is needed only when static path structure sits in
    /// front of the capture. The bare catch-all already hands the inner app
    /// the path it should see.
    pub fn needs_rewrite(&self) -> bool {
        self.has_wildcard() && self.pattern != CATCH_ALL_PATTERN
    }
}

/// Everything the wrapper chain needs to know about the outer route for one
/// request. Scoped to that request's extensions and dropped with it; the
/// outer framework never sees it again.
#[derive(Debug, Clone)]
pub(crate) struct RouteContext {
    /// Mount prefix still present in the URI, without a trailing slash.
    /// Empty when mounted at the root or when the router already stripped
    /// it (nested routes).
    pub prefix: String,
    /// Raw wildcard remainder. `None` when the pattern has no capture,
    /// `Some("")` on a root match.
    pub captured: Option<String>,
    /// Original query string, without the leading `?`.
    pub query: Option<String>,
}

impl RouteContext {
    pub fn derive(spec: &RouteSpec, req: &Request<Body>) -> Self {
        // The dispatched path always carries the pattern's own static part;
        // anything after it is the capture.
        let captured = spec.wildcard_prefix.as_deref().map(|static_part| {
            req.uri()
                .path()
                .strip_prefix(static_part)
                .map(str::to_string)
                .unwrap_or_default()
        });

        Self {
            prefix: spec.mount_prefix.clone(),
            captured,
            query: req.uri().query().map(str::to_string),
        }
    }
}
