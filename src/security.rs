//! # Security Module
//!
//! HTTP Basic authentication for the admin area.
//!
//! ## Overview
//!
//! A [`SecurityProvider`] inspects a request's headers and answers a single
//! yes/no question. [`BasicAuthProvider`] is the only provider: it decodes
//! `Authorization: Basic <base64(user:pass)>` and compares both halves with
//! the configured credentials.
//!
//! Every failure (no header, a different scheme, bad base64, no colon, wrong
//! user or password) is the same `false`; callers answer all of them with
//! the identical [`challenge_response`]. No session is created, so every
//! admin request has to carry credentials again.
//!
//! ## Example
//!
//! ```rust
//! use contactd::security::{BasicAuthProvider, SecurityProvider, SecurityRequest};
//!
//! let provider = BasicAuthProvider::new("admin", "admin");
//! let headers = vec![("Authorization".to_string(), "Basic YWRtaW46YWRtaW4=".to_string())];
//! assert!(provider.validate(&SecurityRequest { headers: &headers }));
//! ```

use crate::server::response::{fallback, Response};
use base64::{engine::general_purpose, Engine as _};

/// Realm announced in the `WWW-Authenticate` challenge.
pub const ADMIN_REALM: &str = "Admin Area";

/// Request context for security validation.
pub struct SecurityRequest<'a> {
    /// Header lines in arrival order
    pub headers: &'a [(String, String)],
}

impl SecurityRequest<'_> {
    /// Case-insensitive lookup; the last occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Trait for implementing request authentication.
pub trait SecurityProvider: Send + Sync {
    /// `true` if the request is admitted.
    fn validate(&self, req: &SecurityRequest) -> bool;
}

/// Static single-user Basic-Auth provider.
pub struct BasicAuthProvider {
    username: String,
    password: String,
}

impl BasicAuthProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl SecurityProvider for BasicAuthProvider {
    fn validate(&self, req: &SecurityRequest) -> bool {
        let Some((user, pass)) = req.header("authorization").and_then(parse_basic_credentials)
        else {
            return false;
        };
        // Both halves are always compared.
        let user_ok = constant_time_eq(user.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(pass.as_bytes(), self.password.as_bytes());
        user_ok & pass_ok
    }
}

/// Decode an `Authorization` header value of the form `Basic <token>`.
///
/// Returns `(username, password)` split on the first colon, or `None` for
/// any other scheme, invalid base64, non UTF-8 content or a missing colon.
pub fn parse_basic_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = general_purpose::STANDARD.decode(token.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The 401 answer for any unauthenticated admin request.
pub fn challenge_response() -> Response {
    Response::new(401)
        .header(
            "WWW-Authenticate",
            &format!("Basic realm=\"{ADMIN_REALM}\""),
        )
        .header("Cache-Control", "no-cache, no-store, must-revalidate")
        .header("Pragma", "no-cache")
        .header("Expires", "0")
        .header("Content-Type", crate::server::response::HTML_UTF8)
        .body(fallback::AUTH_REQUIRED.as_bytes().to_vec())
}
