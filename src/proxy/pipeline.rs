//! Proxy response pipeline.
//!
//! One pipeline instance handles one proxied request, moving through
//! `Receiving → {Buffering | Streaming} → Responding`, with any failure
//! absorbing into `Failed` (the caller ends the client response with an
//! empty body).
//!
//! - **Receiving**: the upstream request is issued with sanitized headers and
//!   the response head is awaited. The content-type decides the branch.
//! - **Buffering** (`text/html`): the whole body is collected, decompressed
//!   if the upstream compressed it, URL-rewritten, then re-encoded to the
//!   client's preferred encoding.
//! - **Streaming** (everything else): headers go out immediately and body
//!   chunks flow through the negotiated transform in arrival order, never
//!   fully materialized.
//!
//! Headers are written exactly once, before any body bytes, only after the
//! encoding decision is final.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::LimitsConfig;
use crate::http::headers::incoming_headers;
use crate::proxy::codec::{
    self, AcceptedEncodings, ContentEncoding, EncodedStream, EncodingNegotiation,
};
use crate::proxy::rewrite::{rewrite_html, RewriteContext};
use crate::routing::ProxyTarget;

/// Fatal per-request pipeline failures. Never retried; the client response
/// ends with no body.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

/// Body handling strategy, decided by the upstream content-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyPlan {
    /// `text/html`: buffer, decompress, rewrite, re-encode.
    Buffered,
    /// Everything else: stream through the negotiated transform.
    Streamed,
}

fn plan_for(content_type: Option<&str>) -> BodyPlan {
    match content_type {
        Some(value) if value.trim().to_lowercase().starts_with("text/html") => BodyPlan::Buffered,
        _ => BodyPlan::Streamed,
    }
}

/// Run the pipeline for one proxied request.
pub async fn run(
    client: &reqwest::Client,
    target: ProxyTarget,
    context: RewriteContext,
    limits: &LimitsConfig,
) -> Result<Response<Body>, PipelineError> {
    let url = target.url();
    trace!(url = %url, method = %target.method, "Issuing upstream request");

    let upstream = client
        .request(target.method.clone(), url.as_str())
        .headers(target.outgoing_headers.clone())
        .send()
        .await?;

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();

    let negotiation = EncodingNegotiation {
        client_accepts: AcceptedEncodings::parse(
            target
                .outgoing_headers
                .get(header::ACCEPT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        ),
        upstream: ContentEncoding::parse(
            upstream_headers
                .get(header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        ),
    };
    let upstream_encoding_raw = upstream_headers
        .get(header::CONTENT_ENCODING)
        .cloned();
    let content_type = upstream_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let plan = plan_for(content_type);

    debug!(
        status = %status,
        path = %target.path,
        content_type = content_type.unwrap_or(""),
        plan = ?plan,
        "Upstream response received"
    );

    let mut response_headers = incoming_headers(&upstream_headers);

    let body = match plan {
        BodyPlan::Buffered => {
            let raw = upstream.bytes().await?;
            let decoded = if negotiation.upstream.is_compressed() {
                codec::decompress(&raw, negotiation.upstream, limits.max_html_buffer)?
            } else {
                raw.to_vec()
            };

            let rewritten = rewrite_html(&String::from_utf8_lossy(&decoded), &context);

            let chosen = negotiation.client_accepts.preferred();
            let encoded = codec::compress(rewritten.as_bytes(), chosen)?;
            if let Some(value) = chosen.header_value() {
                response_headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(value));
            }
            Body::from(encoded)
        }
        BodyPlan::Streamed => {
            use futures_util::TryStreamExt;

            let stream = upstream
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

            match negotiation.upstream {
                // Already compressed (or opaque): pass the bytes through and
                // restore the upstream's own content-encoding.
                ContentEncoding::Gzip | ContentEncoding::Deflate | ContentEncoding::Unknown => {
                    if let Some(value) = upstream_encoding_raw {
                        response_headers.insert(header::CONTENT_ENCODING, value);
                    }
                    Body::from_stream(stream)
                }
                ContentEncoding::Identity => {
                    let chosen = negotiation.client_accepts.preferred();
                    if let Some(value) = chosen.header_value() {
                        response_headers
                            .insert(header::CONTENT_ENCODING, HeaderValue::from_static(value));
                    }
                    Body::from_stream(EncodedStream::new(Box::pin(stream), chosen))
                }
            }
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
