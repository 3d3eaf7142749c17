//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, gateway dispatch)
//!     → request.rs (request ID stamping)
//!     → [routing classifier decides the request class]
//!     → headers.rs (sanitize headers for proxied exchanges)
//!     → Send to client
//! ```

pub mod headers;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
