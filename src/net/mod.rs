//! Network subsystem.
//!
//! # Responsibilities
//! - Load TLS certificate material for the listener
//!
//! # Design Decisions
//! - Missing certificate files are reported before rustls is involved, so
//!   the caller can fall back to plaintext with a useful message

pub mod tls;
