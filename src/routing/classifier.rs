//! Inbound path classification.
//!
//! The first path segment decides how a request is handled: `proxy` targets a
//! remote origin, `api` targets a registered resource handler, and anything
//! else falls through to the static file server.

use axum::http::{HeaderMap, Method};
use thiserror::Error;

use crate::http::headers::outgoing_headers;

/// Classification failure. The caller terminates the exchange with an empty
/// body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("request path has no segments")]
    EmptyPath,

    #[error("invalid upstream port: {0}")]
    InvalidPort(String),
}

/// Target of one proxied request. Constructed once from the parsed path and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub hostname: String,
    pub port: u16,
    pub path: String,
    pub method: Method,
    pub use_tls: bool,
    pub outgoing_headers: HeaderMap,
}

impl ProxyTarget {
    /// Full upstream URL for this target.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.hostname, self.port, self.path)
    }
}

/// Parsed `/api/...` path. The body, if any, is read by the dispatch shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    pub resource_type: String,
    pub resource: String,
    pub subresource: Option<String>,
}

/// One of the three request classes served by the gateway.
#[derive(Debug, Clone)]
pub enum RequestClass {
    Proxy(ProxyTarget),
    Api(ApiPath),
    Static,
}

/// Classify an inbound request by its path.
///
/// The proxy grammar is `/proxy/<https://|http://><host>[:<port>]/<path...>`.
/// A scheme prefix spans two segments because of its `//`, so the remainder is
/// rejoined before the prefix is stripped.
pub fn classify(
    path: &str,
    method: &Method,
    client_headers: &HeaderMap,
) -> Result<RequestClass, ClassifyError> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.is_empty() {
        return Err(ClassifyError::EmptyPath);
    }
    if segments[0].is_empty() {
        segments.remove(0);
    }
    if segments.is_empty() {
        return Ok(RequestClass::Static);
    }

    let tag = segments[0];
    let rest = &segments[1..];

    match tag {
        "proxy" => parse_proxy_target(rest, method, client_headers).map(RequestClass::Proxy),
        "api" => Ok(RequestClass::Api(ApiPath {
            resource_type: rest.first().unwrap_or(&"").to_string(),
            resource: rest.get(1).unwrap_or(&"").to_string(),
            subresource: rest.get(2).map(|s| s.to_string()),
        })),
        _ => Ok(RequestClass::Static),
    }
}

fn parse_proxy_target(
    rest: &[&str],
    method: &Method,
    client_headers: &HeaderMap,
) -> Result<ProxyTarget, ClassifyError> {
    let rest = rest.join("/");

    let (use_tls, stripped) = if let Some(r) = rest.strip_prefix("https://") {
        (true, r)
    } else if let Some(r) = rest.strip_prefix("http://") {
        (false, r)
    } else {
        (false, rest.as_str())
    };

    let (host_segment, subpath) = match stripped.split_once('/') {
        Some((host, path)) => (host, Some(path)),
        None => (stripped, None),
    };

    let (hostname, port) = match host_segment.split_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ClassifyError::InvalidPort(port.to_string()))?;
            (host, port)
        }
        None => (host_segment, 80),
    };

    let path = match subpath {
        Some(p) => format!("/{}", p),
        None => "/".to_string(),
    };

    Ok(ProxyTarget {
        hostname: hostname.to_string(),
        port,
        path,
        method: method.clone(),
        use_tls,
        outgoing_headers: outgoing_headers(client_headers),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_path(path: &str) -> RequestClass {
        classify(path, &Method::GET, &HeaderMap::new()).unwrap()
    }

    #[test]
    fn proxy_with_port_and_path() {
        let class = classify_path("/proxy/http://h:8081/a/b");
        match class {
            RequestClass::Proxy(target) => {
                assert_eq!(target.hostname, "h");
                assert_eq!(target.port, 8081);
                assert_eq!(target.path, "/a/b");
                assert!(!target.use_tls);
            }
            other => panic!("expected proxy class, got {:?}", other),
        }
    }

    #[test]
    fn proxy_https_prefix_sets_tls() {
        match classify_path("/proxy/https://secure.example/login") {
            RequestClass::Proxy(target) => {
                assert_eq!(target.hostname, "secure.example");
                assert_eq!(target.port, 80);
                assert_eq!(target.path, "/login");
                assert!(target.use_tls);
            }
            other => panic!("expected proxy class, got {:?}", other),
        }
    }

    #[test]
    fn proxy_defaults_without_scheme() {
        match classify_path("/proxy/cdn.example.org") {
            RequestClass::Proxy(target) => {
                assert_eq!(target.hostname, "cdn.example.org");
                assert_eq!(target.port, 80);
                assert_eq!(target.path, "/");
                assert!(!target.use_tls);
            }
            other => panic!("expected proxy class, got {:?}", other),
        }
    }

    #[test]
    fn proxy_preserves_method() {
        let class = classify("/proxy/http://h/x", &Method::POST, &HeaderMap::new()).unwrap();
        match class {
            RequestClass::Proxy(target) => assert_eq!(target.method, Method::POST),
            other => panic!("expected proxy class, got {:?}", other),
        }
    }

    #[test]
    fn proxy_keeps_literal_dot_segments() {
        // Traversal protection is a static-file concern; the proxy forwards
        // the subpath exactly as received.
        match classify_path("/proxy/http://host/../../etc/passwd") {
            RequestClass::Proxy(target) => {
                assert_eq!(target.hostname, "host");
                assert_eq!(target.path, "/../../etc/passwd");
            }
            other => panic!("expected proxy class, got {:?}", other),
        }
    }

    #[test]
    fn proxy_rejects_bad_port() {
        let err = classify("/proxy/http://h:abc/x", &Method::GET, &HeaderMap::new()).unwrap_err();
        assert_eq!(err, ClassifyError::InvalidPort("abc".to_string()));
    }

    #[test]
    fn proxy_sanitizes_outgoing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("accept-encoding", "gzip".parse().unwrap());
        headers.insert("cookie", "secret=1".parse().unwrap());
        let class = classify("/proxy/http://h/x", &Method::GET, &headers).unwrap();
        match class {
            RequestClass::Proxy(target) => {
                assert!(target.outgoing_headers.contains_key("accept-encoding"));
                assert!(!target.outgoing_headers.contains_key("cookie"));
            }
            other => panic!("expected proxy class, got {:?}", other),
        }
    }

    #[test]
    fn api_with_subresource() {
        assert_eq!(
            match classify_path("/api/camera/front/snapshot") {
                RequestClass::Api(api) => api,
                other => panic!("expected api class, got {:?}", other),
            },
            ApiPath {
                resource_type: "camera".to_string(),
                resource: "front".to_string(),
                subresource: Some("snapshot".to_string()),
            }
        );
    }

    #[test]
    fn api_without_subresource() {
        match classify_path("/api/camera/front") {
            RequestClass::Api(api) => {
                assert_eq!(api.resource, "front");
                assert_eq!(api.subresource, None);
            }
            other => panic!("expected api class, got {:?}", other),
        }
    }

    #[test]
    fn everything_else_is_static() {
        assert!(matches!(classify_path("/"), RequestClass::Static));
        assert!(matches!(classify_path("/index.html"), RequestClass::Static));
        assert!(matches!(classify_path("/css/site.css"), RequestClass::Static));
        assert!(matches!(classify_path("/proxy2/x"), RequestClass::Static));
    }
}
