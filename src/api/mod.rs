//! JSON API dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! /api/<resourceType>/<resource>[/<subresource>] + optional JSON body
//!     → dispatch.rs (exact-name lookup in the handler registry)
//!     → ResourceHandler::perform_api_request
//!     → handler response piped to the client,
//!       or 404 (no handler) / 500 + {"error": ...} (handler failure)
//! ```
//!
//! # Design Decisions
//! - Handlers are registered explicitly at startup; there is no global list
//! - A malformed JSON body is logged and dropped, never a request failure
//! - Handler internals are opaque to the gateway

pub mod dispatch;

pub use dispatch::{
    dispatch, ApiRequest, ApiResponse, HandlerError, HandlerRegistry, ResourceHandler,
};
