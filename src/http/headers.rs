//! Header sanitization for proxied exchanges.
//!
//! # Responsibilities
//! - Derive the header set sent upstream from the client's request headers
//! - Derive the header set returned downstream from the upstream's response
//! - Strip framing headers that become invalid once the body is re-encoded
//!
//! # Design Decisions
//! - Upstream only ever sees `accept-encoding` and `user-agent`; everything
//!   else is dropped so proxy-internal headers cannot leak
//! - `content-encoding`, `content-length` and `transfer-encoding` are
//!   recomputed downstream, never copied
//! - Both transforms are idempotent

use axum::http::{header, HeaderMap, HeaderValue};

/// Headers forwarded to the proxied origin.
///
/// Only `accept-encoding` and `user-agent` survive; values are copied
/// verbatim.
pub fn outgoing_headers(client_headers: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [header::ACCEPT_ENCODING, header::USER_AGENT] {
        if let Some(value) = client_headers.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers
}

/// Headers returned to the client.
///
/// Copies every upstream header except the three framing headers, which the
/// pipeline recomputes after re-encoding, then force-sets
/// `access-control-allow-origin: *`.
pub fn incoming_headers(upstream_headers: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream_headers.iter() {
        if name == header::CONTENT_ENCODING
            || name == header::CONTENT_LENGTH
            || name == header::TRANSFER_ENCODING
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers
}
