//! Static file serving subsystem.
//!
//! # Data Flow
//! ```text
//! unclassified request path
//!     → serve.rs (lexical resolution against the configured root)
//!     → 403 on traversal, before any filesystem access
//!     → existing file → MIME lookup → bytes
//!     → missing manifest → handler.generate_manifest → bytes
//!     → 404 otherwise
//! ```
//!
//! # Design Decisions
//! - Traversal is decided lexically; the filesystem is never consulted for a
//!   path that resolves outside the root
//! - The extension→MIME table is fixed; unknown extensions are text/plain

pub mod serve;

pub use serve::serve;
