//! Root-scoped static file serving.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use tracing::{debug, warn};

use crate::api::HandlerRegistry;

/// Directory under the root holding per-handler live stream output.
const LIVE_STREAM_DIR: &str = "webm_live";

/// Fixed extension→MIME table. `.mpd` is an MPEG-DASH manifest and `.chk` a
/// VP9-in-WebM DASH segment.
fn content_type_for(extension: Option<&str>) -> &'static str {
    match extension {
        Some("ico") => "image/x-icon",
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("css") => "text/css",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("mpd") => "application/dash+xml",
        Some("chk") => "video/webm",
        _ => "text/plain",
    }
}

/// Lexically resolve a request path inside the root.
///
/// `.` segments are dropped and `..` segments pop; popping past the root
/// means the path escapes and resolution fails. No filesystem access.
fn resolve_within(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut stack: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => stack.push(part),
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return None;
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    let mut resolved = root.to_path_buf();
    for part in stack {
        resolved.push(part);
    }
    Some(resolved)
}

/// Serve a static request relative to `root`.
pub async fn serve(root: &str, request_path: &str, registry: &HandlerRegistry) -> Response<Body> {
    let root = Path::new(root);
    let Some(mut pathname) = resolve_within(root, request_path) else {
        warn!(path = %request_path, "Static request escapes the root");
        return status_response(StatusCode::FORBIDDEN);
    };

    match tokio::fs::metadata(&pathname).await {
        Ok(meta) => {
            if meta.is_dir() {
                pathname.push("index.html");
            }
            for handler in registry.iter() {
                handler.check_static_request(request_path);
            }
            send_file(&pathname).await
        }
        Err(_) => {
            // A missing manifest may belong to a registered live stream:
            // <root>/webm_live/<handler>/manifest.mpd is generated on demand.
            if let Some(handler_name) = live_stream_manifest_owner(root, &pathname) {
                if let Some(handler) = registry.get(&handler_name) {
                    debug!(handler = %handler_name, path = %request_path, "Generating live stream manifest");
                    return match handler.generate_manifest(&pathname).await {
                        Ok(()) => send_file(&pathname).await,
                        Err(error) => {
                            warn!(handler = %handler_name, error = %error, "Manifest generation failed");
                            text_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                        }
                    };
                }
            }
            text_response(StatusCode::NOT_FOUND, "not found".to_string())
        }
    }
}

/// If `pathname` is a missing live-stream manifest, the name of the handler
/// that owns it.
fn live_stream_manifest_owner(root: &Path, pathname: &Path) -> Option<String> {
    let relative = pathname.strip_prefix(root).ok()?;
    let parts: Vec<&std::ffi::OsStr> = relative.iter().collect();
    if parts.len() != 3 || parts[0].to_str() != Some(LIVE_STREAM_DIR) {
        return None;
    }
    if pathname.extension()?.to_str()? != "mpd" {
        return None;
    }
    Some(parts[1].to_string_lossy().into_owned())
}

async fn send_file(pathname: &Path) -> Response<Body> {
    let extension = pathname.extension().and_then(|e| e.to_str());
    match tokio::fs::read(pathname).await {
        Ok(data) => {
            let mut response = Response::new(Body::from(data));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(extension)),
            );
            response
        }
        Err(error) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error getting the file: {}.", error),
        ),
    }
}

fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_table_matches_the_fixed_map() {
        assert_eq!(content_type_for(Some("html")), "text/html");
        assert_eq!(content_type_for(Some("js")), "text/javascript");
        assert_eq!(content_type_for(Some("mpd")), "application/dash+xml");
        assert_eq!(content_type_for(Some("chk")), "video/webm");
        assert_eq!(content_type_for(Some("weird")), "text/plain");
        assert_eq!(content_type_for(None), "text/plain");
    }

    #[test]
    fn resolve_stays_inside_root() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve_within(root, "/css/site.css"),
            Some(PathBuf::from("/srv/www/css/site.css"))
        );
        // Dot-dot that stays inside the root is allowed.
        assert_eq!(
            resolve_within(root, "/a/../b.html"),
            Some(PathBuf::from("/srv/www/b.html"))
        );
    }

    #[test]
    fn resolve_rejects_escapes() {
        let root = Path::new("/srv/www");
        assert_eq!(resolve_within(root, "/../secret"), None);
        assert_eq!(resolve_within(root, "/a/../../etc/passwd"), None);
    }

    #[test]
    fn manifest_owner_requires_the_live_stream_shape() {
        let root = Path::new("/srv/www");
        assert_eq!(
            live_stream_manifest_owner(root, Path::new("/srv/www/webm_live/front/manifest.mpd")),
            Some("front".to_string())
        );
        assert_eq!(
            live_stream_manifest_owner(root, Path::new("/srv/www/other/front/manifest.mpd")),
            None
        );
        assert_eq!(
            live_stream_manifest_owner(root, Path::new("/srv/www/webm_live/front/segment.chk")),
            None
        );
        assert_eq!(
            live_stream_manifest_owner(root, Path::new("/srv/www/webm_live/manifest.mpd")),
            None
        );
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let registry = HandlerRegistry::new();
        let response = serve("/nonexistent-root", "/missing.html", &registry).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_is_403_without_filesystem_access() {
        // The root does not exist; a traversal must still be rejected before
        // any filesystem call could notice that.
        let registry = HandlerRegistry::new();
        let response = serve("/nonexistent-root", "/../../etc/passwd", &registry).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn serves_an_existing_file_with_mime_type() {
        let dir = std::env::temp_dir().join("proxy-gateway-static-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("page.html"), b"<html></html>")
            .await
            .unwrap();

        let registry = HandlerRegistry::new();
        let response = serve(dir.to_str().unwrap(), "/page.html", &registry).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/html"
        );

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
