//! Per-request adapter between the outer router and the mounted sub-app.
//!
//! # Responsibilities
//! - Assemble the wrapper chain (mount, rewrite) around the inner app
//! - Derive the per-request route context and capture/restore the stash
//! - Monitor response completion and record the final disposition
//!
//! # Design Decisions
//! - The chain is assembled once per registration and cloned per call
//! - Mount stripping runs before the wildcard rewrite, so a capture that
//!   echoes the prefix is never stripped twice
//! - Stash restoration is unconditional and owned by the adapter, never
//!   delegated to middleware the inner app has to invoke
//! - Completion is a oneshot channel joined by a spawned watcher task

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::sync::oneshot;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use crate::config::{AppService, SubApp};
use crate::rewrite::{Mount, RewritePath};
use crate::route::{RouteContext, RouteSpec};
use crate::stash::StreamStash;
use crate::stream::{Completion, CompletionBody};

/// Marker set on responses fully handled by a sub-app. Outer layers must
/// not rewrite or complete the exchange further.
#[derive(Debug, Clone, Copy)]
pub struct Handled;

/// Assembles the wrapper chain placed in front of the mounted app.
///
/// The default harness installs the mount step and the path rewrite
/// (wildcard routes with static structure only). A custom harness swaps
/// the conventions the app is wrapped with, the way the original handler
/// kind accepted an alternate inner-framework implementation.
pub trait Harness: Send + Sync {
    fn assemble(&self, app: AppService, route: &RouteSpec) -> AppService;
}

/// Standard chain: mount stripping, then the conditional rewrite, then the
/// app.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHarness;

impl Harness for DefaultHarness {
    fn assemble(&self, app: AppService, route: &RouteSpec) -> AppService {
        let chain = if route.needs_rewrite() {
            BoxCloneSyncService::new(RewritePath::new(app))
        } else {
            app
        };
        BoxCloneSyncService::new(Mount::new(chain))
    }
}

/// The per-request entry point produced for one route.
#[derive(Clone)]
pub struct SubAppService {
    spec: Arc<RouteSpec>,
    chain: AppService,
}

impl SubAppService {
    /// Build the adapter for the route registered at `route_path`.
    pub fn new(config: &SubApp, route_path: &str) -> Self {
        Self::from_parts(
            config.resolve(),
            config.harness().as_ref(),
            RouteSpec::parse(route_path),
        )
    }

    /// Build from an already-resolved app and parsed route, letting several
    /// routes share one instance.
    pub(crate) fn from_parts(app: AppService, harness: &dyn Harness, spec: RouteSpec) -> Self {
        let chain = harness.assemble(app, &spec);
        Self {
            spec: Arc::new(spec),
            chain,
        }
    }
}

impl Service<Request<Body>> for SubAppService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        // Readiness is driven per call, on a clone of the chain.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let ctx = RouteContext::derive(&self.spec, &req);
        let stash = StreamStash::capture(&req);
        let chain = self.chain.clone();
        let route = self.spec.pattern().to_string();

        tracing::debug!(
            route = %route,
            path = %req.uri().path(),
            prefix = %ctx.prefix,
            "Delegating request to sub-app"
        );

        req.extensions_mut().insert(ctx);

        Box::pin(async move {
            let mut response = match chain.oneshot(req).await {
                Ok(response) => response,
                Err(never) => match never {},
            };

            stash.restore(&mut response);
            response.extensions_mut().insert(Handled);

            let (tx, rx) = oneshot::channel();
            tokio::spawn(watch_completion(rx, route));

            Ok(response.map(|body| Body::new(CompletionBody::new(body, tx))))
        })
    }
}

/// Waits on the completion signal for one delegated response and records
/// the final disposition.
async fn watch_completion(rx: oneshot::Receiver<Completion>, route: String) {
    match rx.await {
        Ok(Completion::Finished) => {
            tracing::debug!(route = %route, "Sub-app response complete; abandoning further processing");
        }
        Ok(Completion::Closed) => {
            tracing::debug!(route = %route, "Sub-app response closed early");
        }
        Ok(Completion::Fault(fault)) => {
            tracing::error!(route = %route, error = %fault, "Sub-app response stream fault");
        }
        // Sender dropped without a terminal state; nothing to report.
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::http::Uri;
    use tower::service_fn;

    #[derive(Clone, Debug, PartialEq)]
    struct OuterMarker(&'static str);

    /// Inner app that records the URI it observed and tampers with the
    /// request state the way a foreign framework might.
    fn probe() -> (SubApp, Arc<Mutex<Option<String>>>) {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let app = service_fn(move |req: Request<Body>| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = Some(req.uri().to_string());
                let mut res = Response::new(Body::from("inner"));
                res.extensions_mut().insert(OuterMarker("substituted"));
                Ok::<_, Infallible>(res)
            }
        });
        (SubApp::new(app), seen)
    }

    #[tokio::test]
    async fn test_wildcard_route_rewrites_for_inner_app() {
        let (config, seen) = probe();
        let svc = SubAppService::new(&config, "/files/{*sub_path}");

        let req = Request::builder()
            .uri("/files/a/b?x=1")
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("/a/b?x=1"));
    }

    #[tokio::test]
    async fn test_fixed_route_reaches_inner_app_unmodified() {
        let (config, seen) = probe();
        let svc = SubAppService::new(&config, "/status");

        let req = Request::builder()
            .uri("/status?verbose=1")
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("/status?verbose=1"));
    }

    #[tokio::test]
    async fn test_capture_echoing_the_prefix_is_kept() {
        let (config, seen) = probe();
        let svc = SubAppService::from_parts(
            config.resolve(),
            config.harness().as_ref(),
            RouteSpec::with_mount_prefix("/outer/{*sub_path}", "/outer"),
        );

        let req = Request::builder()
            .uri("/outer/outer/x")
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("/outer/x"));
    }

    #[tokio::test]
    async fn test_custom_harness_replaces_the_chain() {
        struct PinnedPath;

        impl Harness for PinnedPath {
            fn assemble(&self, app: AppService, _route: &RouteSpec) -> AppService {
                BoxCloneSyncService::new(service_fn(move |mut req: Request<Body>| {
                    let app = app.clone();
                    async move {
                        *req.uri_mut() = Uri::from_static("/pinned");
                        app.oneshot(req).await
                    }
                }))
            }
        }

        let (config, seen) = probe();
        let config = config.with_harness(PinnedPath);
        let svc = SubAppService::new(&config, "/files/{*sub_path}");

        let req = Request::builder()
            .uri("/files/a/b")
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        // The default rewrite never ran; the custom chain did.
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/pinned"));
    }

    #[tokio::test]
    async fn test_response_is_marked_handled_and_state_restored() {
        let (config, _seen) = probe();
        let svc = SubAppService::new(&config, "/{*sub_path}");

        let mut req = Request::builder()
            .uri("/anything")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(OuterMarker("outer"));

        let res = svc.oneshot(req).await.unwrap();
        assert!(res.extensions().get::<Handled>().is_some());
        // The inner app substituted its own marker; the stash wins.
        assert_eq!(
            res.extensions().get::<OuterMarker>(),
            Some(&OuterMarker("outer"))
        );
    }

    #[tokio::test]
    async fn test_route_context_does_not_leak_to_outer_framework() {
        let (config, _seen) = probe();
        let svc = SubAppService::new(&config, "/{*sub_path}");

        let req = Request::builder()
            .uri("/anything")
            .body(Body::empty())
            .unwrap();
        let res = svc.oneshot(req).await.unwrap();

        assert!(res.extensions().get::<RouteContext>().is_none());
    }
}
