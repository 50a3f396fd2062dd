//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum router over the bridge facade
//! - Wire up middleware (request id, tracing, body limit, timeout, headers)
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::bridge::Bridge;
use crate::config::SecurityConfig;
use crate::http::handlers;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(bridge: Arc<Bridge>, security: &SecurityConfig) -> Self {
        Self {
            router: build_router(AppState { bridge }, security),
        }
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, security: &SecurityConfig) -> Router {
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    let mut router = Router::new()
        .route("/api/v1/operations", post(handlers::submit_operation))
        .route("/api/v1/quote", post(handlers::quote))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .with_state(state);

    if security.enable_headers {
        router = router
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ));
    }

    router
        .layer(RequestBodyLimitLayer::new(security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(security.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
