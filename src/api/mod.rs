mod error;
mod rest;
mod types;

pub use error::{ApiError, ApiResult};
pub use rest::RestApi;
pub use types::*;

use crate::metrics::metrics_route;
use crate::relay::SubmissionIntake;
use axum::http::{header, HeaderValue};
use axum::Router;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP server for submissions.
///
/// Every response carries no-cache headers so neither the form nor its
/// result is kept by browsers or proxies.
pub fn create_api_server(intake: Arc<SubmissionIntake>) -> Router {
    let rest_api = RestApi::new(intake);

    Router::new()
        .merge(rest_api.router())
        .route("/metrics", metrics_route())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(TraceLayer::new_for_http())
}
