//! Digital Distributor API library.
//!
//! The HTTP service as a library, so the router can be driven from the
//! integration tests without binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method, Request, Response,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// CORS policy for the configured client origin, credentials allowed.
fn cors_layer(client_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(client_url.trim_end_matches('/')) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(client_url, "CLIENT_URL is not a valid origin, CORS disabled");
            cors
        }
    }
}

/// Build the full application router with every middleware layer.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().client_url);

    routes::routes()
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        role = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_bad_origin_without_panicking() {
        let _ = cors_layer("http://localhost:5173/");
        let _ = cors_layer("not\na header");
    }
}
