//! Resource handler contract and API dispatch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Response, StatusCode};
use thiserror::Error;
use tracing::warn;

use crate::routing::ApiPath;

/// Failure reported by a resource handler. Surfaced to the client as a 500
/// with a JSON body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A fully parsed API request handed to a resource handler.
#[derive(Debug)]
pub struct ApiRequest {
    pub resource_type: String,
    pub resource: String,
    pub subresource: Option<String>,
    pub method: Method,
    /// Parsed JSON body, absent when the request had none or it failed to
    /// parse.
    pub body: Option<serde_json::Value>,
}

/// Response produced by a resource handler: a status plus a body stream the
/// dispatcher pipes to the client.
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Body,
}

/// Contract every pluggable resource (e.g. a camera) satisfies. The gateway
/// never inspects handler internals.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Name matched against the `<resource>` path segment.
    fn name(&self) -> &str;

    /// Serve one API request addressed to this resource.
    async fn perform_api_request(&self, request: &ApiRequest) -> Result<ApiResponse, HandlerError>;

    /// Observe a static file request (side-effect hook; e.g. a camera keeps
    /// its live stream warm while segments are being fetched).
    fn check_static_request(&self, path: &str);

    /// Produce the live-stream manifest at `path` so the static server can
    /// serve it.
    async fn generate_manifest(&self, path: &Path) -> Result<(), HandlerError>;
}

/// Explicit mapping from resource name to handler, built at startup and
/// read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ResourceHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name. A later handler with the same
    /// name replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ResourceHandler>> {
        self.handlers.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ResourceHandler>> {
        self.handlers.values()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Dispatch a parsed API request to the matching handler.
///
/// The resource segment is matched against handler names exactly. No match
/// is a 404 with an empty body; a handler failure is a 500 with
/// `{"error": message}`.
pub async fn dispatch(
    registry: &HandlerRegistry,
    path: ApiPath,
    method: Method,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let Some(handler) = registry.get(&path.resource) else {
        warn!(resource = %path.resource, "No handler for API resource");
        return empty_response(StatusCode::NOT_FOUND);
    };

    let request = ApiRequest {
        resource_type: path.resource_type,
        resource: path.resource,
        subresource: path.subresource,
        method,
        body,
    };

    match handler.perform_api_request(&request).await {
        Ok(api_response) => {
            let mut response = Response::new(api_response.body);
            *response.status_mut() = api_response.status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain"),
            );
            response
        }
        Err(error) => {
            warn!(resource = %request.resource, error = %error, "Handler failed");
            let body = serde_json::json!({ "error": error.to_string() });
            let mut response = Response::new(Body::from(body.to_string()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
    }
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
