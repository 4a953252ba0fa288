//! Sub-app definition and resolution.
//!
//! # Responsibilities
//! - Describe the inner app (ready-made service or factory)
//! - Carry the optional harness override
//! - Resolve to one erased service instance at registration time
//!
//! # Design Decisions
//! - Immutable once registered; lives as long as the route
//! - Factories run exactly once per registration, never per request

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use crate::handler::{DefaultHarness, Harness};

/// Erased inner-app service type. Inner apps follow raw `tower`/`hyper`
/// conventions: they receive the translated request and drive the response
/// body themselves.
pub type AppService = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// Where the inner app comes from.
#[derive(Clone)]
enum AppSource {
    /// Ready-made service instance.
    Instance(AppService),
    /// Factory invoked once per registration.
    Factory(Arc<dyn Fn() -> AppService + Send + Sync>),
}

/// Configuration for one mounted sub-app.
#[derive(Clone)]
pub struct SubApp {
    source: AppSource,
    harness: Arc<dyn Harness>,
}

impl SubApp {
    /// Mount a ready-made service.
    pub fn new<S>(app: S) -> Self
    where
        S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse + 'static,
        S::Future: Send + 'static,
    {
        Self {
            source: AppSource::Instance(erase(app)),
            harness: Arc::new(DefaultHarness),
        }
    }

    /// Mount an app built by `factory`. The factory runs exactly once, when
    /// the route is registered.
    pub fn from_factory<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse + 'static,
        S::Future: Send + 'static,
    {
        Self {
            source: AppSource::Factory(Arc::new(move || erase(factory()))),
            harness: Arc::new(DefaultHarness),
        }
    }

    /// Override how the wrapper chain around the app is assembled.
    pub fn with_harness<H: Harness + 'static>(mut self, harness: H) -> Self {
        self.harness = Arc::new(harness);
        self
    }

    /// Build the inner app instance.
    pub(crate) fn resolve(&self) -> AppService {
        match &self.source {
            AppSource::Instance(app) => app.clone(),
            AppSource::Factory(build) => build(),
        }
    }

    pub(crate) fn harness(&self) -> Arc<dyn Harness> {
        self.harness.clone()
    }
}

impl fmt::Debug for SubApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            AppSource::Instance(_) => "instance",
            AppSource::Factory(_) => "factory",
        };
        f.debug_struct("SubApp").field("source", &source).finish()
    }
}

fn erase<S>(app: S) -> AppService
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse + 'static,
    S::Future: Send + 'static,
{
    BoxCloneSyncService::new(app.map_response(|res| res.into_response()))
}
