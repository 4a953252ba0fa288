//! Route registration surface.
//!
//! # Responsibilities
//! - Expose the sub-app handler kind for individual routes
//! - Install the catch-all convenience routes for a mount prefix
//! - Attach the raw-streaming route defaults
//!
//! # Design Decisions
//! - The facade registers the prefixed routes itself instead of relying on
//!   `nest`: the router's catch-all matches neither the bare prefix nor its
//!   trailing-slash form, so both root spellings need their own route
//! - Catch-all and root routes share one resolved app instance
//! - Duplicate installation is rejected by the router's own conflict panic,
//!   not re-implemented here

use axum::extract::DefaultBodyLimit;
use axum::routing::{any_service, MethodRouter};
use axum::Router;

use crate::config::SubApp;
use crate::handler::SubAppService;
use crate::route::{RouteSpec, CATCH_ALL_PATTERN, SUB_PATH_PARAM};

/// Build the sub-app handler for one route.
///
/// `route_path` must be the exact pattern the returned handler is
/// registered under; wildcard detection and the rewrite decision are based
/// on it. The handler answers any method and never consumes the request
/// body or parses cookies, so the raw, unparsed stream reaches the inner
/// app.
pub fn sub_app_handler<S>(route_path: &str, config: &SubApp) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    any_service(SubAppService::new(config, route_path)).layer(DefaultBodyLimit::disable())
}

/// Convenience installation of a sub-app behind a catch-all route.
pub trait RouterSubAppExt {
    /// Register `{prefix}/{*sub_path}` plus the root forms `{prefix}` and
    /// `{prefix}/` (neither matches the catch-all), delegating everything
    /// under the prefix to `config`. Pass `"/"` to mount at the root.
    ///
    /// The app instance is resolved once and shared by all routes.
    /// Installing a second sub-app at the same prefix panics, per the
    /// router's own route-conflict guarantee.
    fn mount_sub_app(self, prefix: &str, config: SubApp) -> Self;
}

impl<S> RouterSubAppExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn mount_sub_app(self, prefix: &str, config: SubApp) -> Self {
        let app = config.resolve();
        let harness = config.harness();
        let prefix = prefix.trim_end_matches('/');

        let route_for = |pattern: &str| {
            let spec = RouteSpec::with_mount_prefix(pattern, prefix);
            any_service(SubAppService::from_parts(
                app.clone(),
                harness.as_ref(),
                spec,
            ))
            .layer(DefaultBodyLimit::disable())
        };

        if prefix.is_empty() {
            self.route(CATCH_ALL_PATTERN, route_for(CATCH_ALL_PATTERN))
                .route("/", route_for("/"))
        } else {
            let catch_all = format!("{prefix}/{{*{SUB_PATH_PARAM}}}");
            let trailing = format!("{prefix}/");
            self.route(&catch_all, route_for(&catch_all))
                .route(prefix, route_for(prefix))
                .route(&trailing, route_for(&trailing))
        }
    }
}
