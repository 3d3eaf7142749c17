//! Content-encoding negotiation and (de)compression.
//!
//! # Responsibilities
//! - Parse the upstream `content-encoding` and the client `accept-encoding`
//! - Buffered decompress/compress for payloads that must be rewritten
//! - Streamed compression for pass-through payloads
//!
//! # Design Decisions
//! - gzip is preferred over deflate when the client accepts both
//! - HTTP `deflate` is the zlib container, matching what browsers send
//! - Buffered decompression is bounded; exceeding the limit is a fatal
//!   per-request failure, the same as corrupt input

use std::io::{Read, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use futures_util::Stream;
use thiserror::Error;

/// Errors produced while transforming a body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("decompressed payload exceeds limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
}

/// A body's content encoding as declared by `content-encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
    Identity,
    /// Present but not an encoding this gateway can transform (e.g. `br`).
    Unknown,
}

impl ContentEncoding {
    /// Parse a `content-encoding` header value. Absent or empty means
    /// identity.
    pub fn parse(header: Option<&str>) -> Self {
        match header.map(|v| v.trim().to_lowercase()) {
            None => ContentEncoding::Identity,
            Some(v) if v.is_empty() || v == "identity" => ContentEncoding::Identity,
            Some(v) if v == "gzip" => ContentEncoding::Gzip,
            Some(v) if v == "deflate" => ContentEncoding::Deflate,
            Some(_) => ContentEncoding::Unknown,
        }
    }

    /// True for encodings this gateway can decompress.
    pub fn is_compressed(self) -> bool {
        matches!(self, ContentEncoding::Gzip | ContentEncoding::Deflate)
    }

    /// Value to write back into `content-encoding`, if any.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            ContentEncoding::Gzip => Some("gzip"),
            ContentEncoding::Deflate => Some("deflate"),
            ContentEncoding::Identity | ContentEncoding::Unknown => None,
        }
    }
}

/// Encodings the client is willing to receive, from `accept-encoding`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptedEncodings {
    pub gzip: bool,
    pub deflate: bool,
}

impl AcceptedEncodings {
    /// Case-folded substring test; quality values are ignored.
    pub fn parse(accept_encoding: Option<&str>) -> Self {
        let folded = accept_encoding.unwrap_or("").to_lowercase();
        Self {
            gzip: folded.contains("gzip"),
            deflate: folded.contains("deflate"),
        }
    }

    /// The encoding to apply to a client-bound body: gzip if accepted, else
    /// deflate, else identity.
    pub fn preferred(self) -> ContentEncoding {
        if self.gzip {
            ContentEncoding::Gzip
        } else if self.deflate {
            ContentEncoding::Deflate
        } else {
            ContentEncoding::Identity
        }
    }
}

/// Per-request encoding decision inputs.
#[derive(Debug, Clone, Copy)]
pub struct EncodingNegotiation {
    pub client_accepts: AcceptedEncodings,
    pub upstream: ContentEncoding,
}

/// Decompress a fully buffered body.
///
/// Reads in chunks so the output limit is enforced while inflating rather
/// than after.
pub fn decompress(
    data: &[u8],
    encoding: ContentEncoding,
    max_output: usize,
) -> Result<Vec<u8>, CodecError> {
    match encoding {
        ContentEncoding::Gzip => read_bounded(GzDecoder::new(data), max_output),
        ContentEncoding::Deflate => read_bounded(ZlibDecoder::new(data), max_output),
        ContentEncoding::Identity | ContentEncoding::Unknown => Ok(data.to_vec()),
    }
}

fn read_bounded<R: Read>(mut decoder: R, max_output: usize) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(CodecError::Decompress(e)),
        };
        if output.len() + read > max_output {
            return Err(CodecError::TooLarge { limit: max_output });
        }
        output.extend_from_slice(&buffer[..read]);
    }
    Ok(output)
}

/// Compress a fully buffered body with the chosen encoding.
pub fn compress(data: &[u8], encoding: ContentEncoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(CodecError::Compress)?;
            encoder.finish().map_err(CodecError::Compress)
        }
        ContentEncoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(CodecError::Compress)?;
            encoder.finish().map_err(CodecError::Compress)
        }
        ContentEncoding::Identity | ContentEncoding::Unknown => Ok(data.to_vec()),
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static>>;

enum StreamEncoder {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
}

impl StreamEncoder {
    fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self {
            StreamEncoder::Gzip(encoder) => encoder.write_all(chunk),
            StreamEncoder::Deflate(encoder) => encoder.write_all(chunk),
        }
    }

    /// Bytes produced so far, draining the internal buffer.
    fn take_output(&mut self) -> Vec<u8> {
        match self {
            StreamEncoder::Gzip(encoder) => std::mem::take(encoder.get_mut()),
            StreamEncoder::Deflate(encoder) => std::mem::take(encoder.get_mut()),
        }
    }

    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            StreamEncoder::Gzip(encoder) => encoder.finish(),
            StreamEncoder::Deflate(encoder) => encoder.finish(),
        }
    }
}

enum StreamState {
    Reading,
    Done,
}

/// Streamed pass-through compression.
///
/// Feeds upstream chunks through a flate2 write-encoder and emits whatever
/// the encoder has produced so far, so client-bound bytes flow in upstream
/// arrival order without materializing the body. With
/// [`ContentEncoding::Identity`] (or an unknown encoding) chunks pass through
/// untouched.
pub struct EncodedStream {
    inner: ByteStream,
    encoder: Option<StreamEncoder>,
    state: StreamState,
}

impl EncodedStream {
    pub fn new(inner: ByteStream, encoding: ContentEncoding) -> Self {
        let encoder = match encoding {
            ContentEncoding::Gzip => Some(StreamEncoder::Gzip(GzEncoder::new(
                Vec::new(),
                Compression::default(),
            ))),
            ContentEncoding::Deflate => Some(StreamEncoder::Deflate(ZlibEncoder::new(
                Vec::new(),
                Compression::default(),
            ))),
            ContentEncoding::Identity | ContentEncoding::Unknown => None,
        };
        Self {
            inner,
            encoder,
            state: StreamState::Reading,
        }
    }
}

impl Stream for EncodedStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if matches!(this.state, StreamState::Done) {
                return Poll::Ready(None);
            }
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => match this.encoder.as_mut() {
                    None => return Poll::Ready(Some(Ok(chunk))),
                    Some(encoder) => {
                        if let Err(e) = encoder.write(&chunk) {
                            this.state = StreamState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        let produced = encoder.take_output();
                        if produced.is_empty() {
                            // Encoder is still buffering; ask upstream for more.
                            continue;
                        }
                        return Poll::Ready(Some(Ok(Bytes::from(produced))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    this.state = StreamState::Done;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.state = StreamState::Done;
                    match this.encoder.take() {
                        None => return Poll::Ready(None),
                        Some(encoder) => {
                            return match encoder.finish() {
                                Ok(tail) if tail.is_empty() => Poll::Ready(None),
                                Ok(tail) => Poll::Ready(Some(Ok(Bytes::from(tail)))),
                                Err(e) => Poll::Ready(Some(Err(e))),
                            };
                        }
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    const LIMIT: usize = 10 * 1024 * 1024;

    #[test]
    fn parses_content_encoding() {
        assert_eq!(ContentEncoding::parse(None), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::parse(Some("")), ContentEncoding::Identity);
        assert_eq!(
            ContentEncoding::parse(Some("identity")),
            ContentEncoding::Identity
        );
        assert_eq!(ContentEncoding::parse(Some("GZIP")), ContentEncoding::Gzip);
        assert_eq!(
            ContentEncoding::parse(Some("deflate")),
            ContentEncoding::Deflate
        );
        assert_eq!(ContentEncoding::parse(Some("br")), ContentEncoding::Unknown);
    }

    #[test]
    fn negotiation_prefers_gzip() {
        let both = AcceptedEncodings::parse(Some("gzip, deflate"));
        assert_eq!(both.preferred(), ContentEncoding::Gzip);

        let deflate_only = AcceptedEncodings::parse(Some("deflate;q=0.5"));
        assert_eq!(deflate_only.preferred(), ContentEncoding::Deflate);

        let neither = AcceptedEncodings::parse(Some("br"));
        assert_eq!(neither.preferred(), ContentEncoding::Identity);

        let absent = AcceptedEncodings::parse(None);
        assert_eq!(absent.preferred(), ContentEncoding::Identity);
    }

    #[test]
    fn gzip_round_trip() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = compress(&original, ContentEncoding::Gzip).unwrap();
        assert_ne!(compressed, original);
        let inflated = decompress(&compressed, ContentEncoding::Gzip, LIMIT).unwrap();
        assert_eq!(inflated, original);
    }

    #[test]
    fn deflate_round_trip() {
        let original = b"pack my box with five dozen liquor jugs".repeat(50);
        let compressed = compress(&original, ContentEncoding::Deflate).unwrap();
        let inflated = decompress(&compressed, ContentEncoding::Deflate, LIMIT).unwrap();
        assert_eq!(inflated, original);
    }

    #[test]
    fn identity_is_a_copy() {
        let original = b"plain bytes".to_vec();
        assert_eq!(
            compress(&original, ContentEncoding::Identity).unwrap(),
            original
        );
        assert_eq!(
            decompress(&original, ContentEncoding::Identity, LIMIT).unwrap(),
            original
        );
    }

    #[test]
    fn corrupt_input_is_an_error() {
        let garbage = b"definitely not a gzip stream";
        let result = decompress(garbage, ContentEncoding::Gzip, LIMIT);
        assert!(matches!(result, Err(CodecError::Decompress(_))));
    }

    #[test]
    fn output_limit_is_enforced() {
        let original = vec![0u8; 1_000_000];
        let compressed = compress(&original, ContentEncoding::Gzip).unwrap();
        let result = decompress(&compressed, ContentEncoding::Gzip, 64 * 1024);
        assert!(matches!(result, Err(CodecError::TooLarge { .. })));
    }

    fn chunked(data: &[u8], chunk: usize) -> ByteStream {
        let chunks: Vec<Result<Bytes, std::io::Error>> = data
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Box::pin(futures_util::stream::iter(chunks))
    }

    #[tokio::test]
    async fn streamed_gzip_matches_buffered_decode() {
        let original = b"streaming compression must not corrupt byte boundaries".repeat(100);
        let stream = EncodedStream::new(chunked(&original, 173), ContentEncoding::Gzip);
        let collected: Vec<u8> = stream
            .map(|item| item.unwrap())
            .collect::<Vec<Bytes>>()
            .await
            .concat();
        let inflated = decompress(&collected, ContentEncoding::Gzip, LIMIT).unwrap();
        assert_eq!(inflated, original);
    }

    #[tokio::test]
    async fn streamed_identity_passes_through() {
        let original = b"raw chunks".repeat(10);
        let stream = EncodedStream::new(chunked(&original, 7), ContentEncoding::Identity);
        let collected: Vec<u8> = stream
            .map(|item| item.unwrap())
            .collect::<Vec<Bytes>>()
            .await
            .concat();
        assert_eq!(collected, original);
    }

    #[tokio::test]
    async fn streamed_error_ends_the_stream() {
        let items: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"first")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "upstream died")),
        ];
        let mut stream = EncodedStream::new(
            Box::pin(futures_util::stream::iter(items)),
            ContentEncoding::Identity,
        );
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
