//! Request classification subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request path + method + headers
//!     → classifier.rs (split segments, pick class)
//!     → RequestClass::Proxy(ProxyTarget)   /proxy/<host>[:<port>]/<path...>
//!     → RequestClass::Api(ApiPath)         /api/<type>/<resource>[/<sub>]
//!     → RequestClass::Static               everything else
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of the request line; no I/O
//! - The API body is read later by the dispatch shell, not here
//! - A malformed port is a classification failure, not a silent default

pub mod classifier;

pub use classifier::{classify, ApiPath, ClassifyError, ProxyTarget, RequestClass};
