//! URL rewriting in front of the mounted app.
//!
//! # Responsibilities
//! - Present `/{captured}{?query}` to the inner app on wildcard routes
//! - Strip the registration-time mount prefix so the app sees paths
//!   relative to its mount
//!
//! # Design Decisions
//! - Pure URI surgery on the passing request; no other state is touched
//! - The router already strips `nest` prefixes before dispatch, so the
//!   rewrite never re-derives them; only the explicit mount prefix of the
//!   registering facade is stripped here
//! - A URI that fails to reassemble is left unmodified and logged

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Uri};
use axum::response::Response;
use tower::Service;

use crate::config::AppService;
use crate::route::RouteContext;

/// Rewrites the URL seen by the inner app to `/{captured}{?query}`, the
/// path relative to the wildcard's static part.
///
/// Installed only for wildcard routes with static path structure in front
/// of the capture; fixed routes and the bare catch-all need no reshaping.
#[derive(Clone)]
pub struct RewritePath {
    inner: AppService,
}

impl RewritePath {
    pub fn new(inner: AppService) -> Self {
        Self { inner }
    }
}

impl Service<Request<Body>> for RewritePath {
    type Response = Response;
    type Error = Infallible;
    type Future = <AppService as Service<Request<Body>>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let target = req.extensions().get::<RouteContext>().and_then(|ctx| {
            let captured = ctx.captured.as_deref()?;
            let mut target = format!("/{captured}");
            if let Some(query) = &ctx.query {
                target.push('?');
                target.push_str(query);
            }
            Some(target)
        });

        if let Some(target) = target {
            set_path_and_query(&mut req, &target);
        }
        self.inner.call(req)
    }
}

/// Strips the registration-time mount prefix from the URI, so the app
/// observes paths relative to its mount point, query preserved. Leaves the
/// URI alone when the prefix is empty or absent from the path.
#[derive(Clone)]
pub struct Mount {
    inner: AppService,
}

impl Mount {
    pub fn new(inner: AppService) -> Self {
        Self { inner }
    }
}

impl Service<Request<Body>> for Mount {
    type Response = Response;
    type Error = Infallible;
    type Future = <AppService as Service<Request<Body>>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let prefix = req
            .extensions()
            .get::<RouteContext>()
            .map(|ctx| ctx.prefix.clone())
            .unwrap_or_default();

        let target = if prefix.is_empty() {
            None
        } else {
            req.uri().path().strip_prefix(prefix.as_str()).map(|rest| {
                let mut target = if rest.starts_with('/') {
                    rest.to_string()
                } else {
                    format!("/{rest}")
                };
                if let Some(query) = req.uri().query() {
                    target.push('?');
                    target.push_str(query);
                }
                target
            })
        };

        if let Some(target) = target {
            set_path_and_query(&mut req, &target);
        }
        self.inner.call(req)
    }
}

/// Replace the request URI's path and query, keeping scheme and authority.
fn set_path_and_query(req: &mut Request<Body>, target: &str) {
    match PathAndQuery::try_from(target) {
        Ok(path_and_query) => {
            let mut parts = req.uri().clone().into_parts();
            parts.path_and_query = Some(path_and_query);
            match Uri::from_parts(parts) {
                Ok(uri) => *req.uri_mut() = uri,
                Err(err) => {
                    tracing::warn!(uri = %target, error = %err, "Rewritten URI failed to reassemble");
                }
            }
        }
        Err(err) => {
            tracing::warn!(uri = %target, error = %err, "Rewritten path is not a valid path-and-query");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use tower::util::BoxCloneSyncService;
    use tower::{service_fn, ServiceExt};

    /// Inner app that records the URI it was called with.
    fn probe() -> (AppService, Arc<Mutex<Option<String>>>) {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let svc = service_fn(move |req: Request<Body>| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = Some(req.uri().to_string());
                Ok::<_, Infallible>(Response::new(Body::empty()))
            }
        });
        (BoxCloneSyncService::new(svc), seen)
    }

    fn with_context(uri: &str, ctx: RouteContext) -> Request<Body> {
        let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        req.extensions_mut().insert(ctx);
        req
    }

    #[tokio::test]
    async fn test_rewrite_presents_capture_and_query() {
        let (app, seen) = probe();
        let svc = RewritePath::new(app);
        let req = with_context(
            "/files/a/b?x=1",
            RouteContext {
                prefix: String::new(),
                captured: Some("a/b".to_string()),
                query: Some("x=1".to_string()),
            },
        );

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/a/b?x=1"));
    }

    #[tokio::test]
    async fn test_rewrite_root_capture_resolves_to_root() {
        let (app, seen) = probe();
        let svc = RewritePath::new(app);
        let req = with_context(
            "/files",
            RouteContext {
                prefix: String::new(),
                captured: Some(String::new()),
                query: None,
            },
        );

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_rewrite_without_context_leaves_uri() {
        let (app, seen) = probe();
        let svc = RewritePath::new(app);
        let req = Request::builder()
            .uri("/as-is?q=2")
            .body(Body::empty())
            .unwrap();

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/as-is?q=2"));
    }

    #[tokio::test]
    async fn test_mount_strips_prefix() {
        let (app, seen) = probe();
        let svc = Mount::new(app);
        let req = with_context(
            "/outer/a?q=2",
            RouteContext {
                prefix: "/outer".to_string(),
                captured: None,
                query: Some("q=2".to_string()),
            },
        );

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/a?q=2"));
    }

    #[tokio::test]
    async fn test_mount_prefix_only_becomes_root() {
        let (app, seen) = probe();
        let svc = Mount::new(app);
        let req = with_context(
            "/outer",
            RouteContext {
                prefix: "/outer".to_string(),
                captured: None,
                query: None,
            },
        );

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_mount_leaves_path_without_the_prefix() {
        // Rewritten wildcard paths are already mount-relative; the strip
        // must not bite into them even when the capture echoes the prefix.
        let (app, seen) = probe();
        let svc = Mount::new(app);
        let req = with_context(
            "/a/b",
            RouteContext {
                prefix: "/outer".to_string(),
                captured: None,
                query: None,
            },
        );

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/a/b"));
    }

    #[tokio::test]
    async fn test_mount_without_prefix_is_passthrough() {
        let (app, seen) = probe();
        let svc = Mount::new(app);
        let req = with_context(
            "/a/b",
            RouteContext {
                prefix: String::new(),
                captured: None,
                query: None,
            },
        );

        svc.oneshot(req).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/a/b"));
    }
}
