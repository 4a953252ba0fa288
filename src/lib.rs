//! Mount a raw `tower`/`hyper`-style service (a "sub-app") inside an axum
//! router.
//!
//! The adapter owns the translation between the two worlds: it rewrites the
//! URL so the sub-app sees paths relative to its mount point, keeps the
//! outer router's request state intact across the delegation, streams the
//! raw request body through untouched, and watches the response stream to
//! completion, classifying terminal faults.
//!
//! ```no_run
//! use std::convert::Infallible;
//!
//! use axum::body::Body;
//! use axum::http::{Request, Response};
//! use axum_subapp::{RouterSubAppExt, SubApp};
//! use tower::service_fn;
//!
//! // A raw hyper-convention service, oblivious to axum.
//! let inner = service_fn(|req: Request<Body>| async move {
//!     Ok::<_, Infallible>(Response::new(Body::from(format!(
//!         "inner saw {}",
//!         req.uri().path()
//!     ))))
//! });
//!
//! let app: axum::Router = axum::Router::new().mount_sub_app("/legacy", SubApp::new(inner));
//! # let _ = app;
//! ```

pub mod config;
pub mod handler;
pub mod register;
pub mod rewrite;
pub mod route;
pub mod stash;
pub mod stream;

pub use config::{AppService, SubApp};
pub use handler::{DefaultHarness, Handled, Harness, SubAppService};
pub use register::{sub_app_handler, RouterSubAppExt};
pub use route::{RouteSpec, CATCH_ALL_PATTERN, SUB_PATH_PARAM};
pub use stash::StreamStash;
pub use stream::{classify, FaultClass, StreamFault};
