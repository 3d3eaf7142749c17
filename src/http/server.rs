//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway's catch-all handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Classify each request and hand it to the proxy pipeline, the API
//!   dispatcher or the static file server
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::{self, HandlerRegistry};
use crate::config::GatewayConfig;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::observability::metrics;
use crate::proxy::{self, RewriteContext};
use crate::routing::{classify, RequestClass};
use crate::static_files;

/// Application state injected into the gateway handler. Read-only after
/// startup.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HandlerRegistry>,
    pub client: reqwest::Client,
    pub config: Arc<GatewayConfig>,
    /// Whether clients reach this gateway over TLS; decides the scheme
    /// written into rewritten URLs.
    pub tls_enabled: bool,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and handler
    /// registry.
    pub fn new(
        config: GatewayConfig,
        registry: HandlerRegistry,
        tls_enabled: bool,
    ) -> Result<Self, reqwest::Error> {
        // One upstream client shared by every pipeline instance. Redirects
        // are not followed and nothing is decompressed here; the pipeline
        // owns both concerns.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream.connect_secs))
            .timeout(Duration::from_secs(config.upstream.request_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let state = AppState {
            registry: Arc::new(registry),
            client,
            config: Arc::new(config.clone()),
            tls_enabled,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.upstream.request_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// The configured router, for serving through a TLS acceptor.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting plaintext connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main gateway handler.
/// Classifies the request and dispatches to the proxy pipeline, the API
/// shell or the static file server.
async fn gateway_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> impl IntoResponse {
    let start_time = Instant::now();
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let method = parts.method.clone();
    let method_str = method.to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Dispatching request"
    );

    let class = match classify(&path, &parts.method, &parts.headers) {
        Ok(class) => class,
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, error = %e, "Classification failed");
            metrics::record_request(&method_str, "invalid", 400, start_time);
            return empty_status(StatusCode::BAD_REQUEST);
        }
    };

    match class {
        RequestClass::Proxy(target) => {
            let context = RewriteContext {
                target_hostname: target.hostname.clone(),
                gateway_scheme: if state.tls_enabled { "https" } else { "http" },
                gateway_authority: state.config.listener.advertised_authority.clone(),
            };

            match proxy::run(&state.client, target, context, &state.config.limits).await {
                Ok(response) => {
                    metrics::record_request(
                        &method_str,
                        "proxy",
                        response.status().as_u16(),
                        start_time,
                    );
                    response.into_response()
                }
                Err(e) => {
                    tracing::error!(request_id = %request_id, path = %path, error = %e, "Proxy pipeline failed");
                    metrics::record_request(&method_str, "proxy", 502, start_time);
                    empty_status(StatusCode::BAD_GATEWAY)
                }
            }
        }
        RequestClass::Api(api_path) => {
            let parsed_body = read_api_body(body, state.config.limits.max_api_body).await;
            let response =
                api::dispatch(&state.registry, api_path, method, parsed_body).await;
            metrics::record_request(&method_str, "api", response.status().as_u16(), start_time);
            response.into_response()
        }
        RequestClass::Static => {
            let response =
                static_files::serve(&state.config.static_files.root, &path, &state.registry).await;
            metrics::record_request(
                &method_str,
                "static",
                response.status().as_u16(),
                start_time,
            );
            response.into_response()
        }
    }
}

/// Read and parse an API request body.
///
/// An unreadable or malformed body is logged and dropped; the request
/// proceeds without one.
async fn read_api_body(body: Body, limit: usize) -> Option<serde_json::Value> {
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read API request body");
            return None;
        }
    };
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(error = %e, "JSON parse error on API request body");
            None
        }
    }
}

fn empty_status(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
