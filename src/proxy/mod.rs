//! Proxy response transformation subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyTarget (from routing)
//!     → pipeline.rs (upstream request, content-type branch)
//!         → codec.rs  (decompress / negotiate / re-encode)
//!         → rewrite.rs (URL rewriting of buffered HTML)
//!     → axum Response (headers once, then body)
//! ```
//!
//! # Design Decisions
//! - HTML is fully buffered so it can be decompressed, rewritten and
//!   re-encoded; everything else streams through untouched buffers
//! - Response headers are finalized before the first body byte is produced,
//!   because `content-encoding` cannot be amended afterwards

pub mod codec;
pub mod pipeline;
pub mod rewrite;

pub use pipeline::{run, PipelineError};
pub use rewrite::RewriteContext;
