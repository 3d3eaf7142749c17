//! URL rewriting for proxied HTML payloads.
//!
//! # Responsibilities
//! - Redirect absolute, protocol-relative and root-relative links found in
//!   quoted markup literals back through the gateway's `/proxy/` path
//!
//! # Design Decisions
//! - Textual pattern substitution, not a DOM parser; quoted strings that are
//!   not URLs may match spuriously and that is accepted
//! - Three ordered passes; a string rewritten by an earlier pass starts with
//!   a quote and `http`, so later passes cannot match it again
//! - Output quotes are normalized to double quotes

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Rewrite parameters for one proxied request. Pure value, no mutation.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// Hostname of the proxied origin, substituted into root-relative links.
    pub target_hostname: String,
    /// Scheme clients use to reach the gateway ("http" or "https").
    pub gateway_scheme: &'static str,
    /// Authority (host:port) clients use to reach the gateway.
    pub gateway_authority: String,
}

impl RewriteContext {
    fn origin(&self) -> String {
        format!("{}://{}", self.gateway_scheme, self.gateway_authority)
    }
}

// "http://external.host/path" and "https://external.host/path"
static ABSOLUTE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)['"]https?://(.*?)['"]"#).expect("absolute url pattern"));

// "//external.host/path"
static PROTOCOL_RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]//(.*?)['"]"#).expect("protocol-relative pattern"));

// "/path/file.ext" (first character after the slash is alphanumeric)
static ROOT_RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]/([a-zA-Z0-9].*?)['"]"#).expect("root-relative pattern"));

/// Rewrite every quoted URL in an HTML document so it resolves through the
/// gateway.
///
/// Absolute and protocol-relative links keep their own host; root-relative
/// links gain the proxied origin's hostname.
pub fn rewrite_html(html: &str, context: &RewriteContext) -> String {
    let origin = context.origin();

    let pass1 = ABSOLUTE_URL.replace_all(html, |caps: &Captures<'_>| {
        format!("\"{}/proxy/{}\"", origin, &caps[1])
    });
    let pass2 = PROTOCOL_RELATIVE.replace_all(&pass1, |caps: &Captures<'_>| {
        format!("\"{}/proxy/{}\"", origin, &caps[1])
    });
    let pass3 = ROOT_RELATIVE.replace_all(&pass2, |caps: &Captures<'_>| {
        format!(
            "\"{}/proxy/{}/{}\"",
            origin, context.target_hostname, &caps[1]
        )
    });

    pass3.into_owned()
}
