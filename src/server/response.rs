use std::io::{self, Write};

/// Reason phrase for every status this server emits.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub const HTML_UTF8: &str = "text/html; charset=utf-8";

/// An HTTP/1.1 response, framed with an exact `Content-Length`.
///
/// Headers keep insertion order. `Content-Length` and `Connection: close`
/// are managed by the type and always reflect the current body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: status_reason(status),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Response with a body and its content type.
    pub fn with_body(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self::new(status).header("Content-Type", content_type).body(body)
    }

    pub fn html(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::with_body(status, HTML_UTF8, body.into())
    }

    /// Append a header; replaces an existing header of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            slot.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Serialize status line, headers, blank line and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    /// Write the whole framed response. `write_all` retries short writes.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_bytes())?;
        out.flush()
    }
}

/// Hardcoded bodies used when the document root has no page for a status.
pub mod fallback {
    pub const NOT_FOUND: &str =
        "<h1>404 Not Found</h1><p>The requested page does not exist.</p>";
    pub const NOT_FOUND_SHORT: &str = "<h1>404 Not Found</h1>";
    pub const METHOD_NOT_ALLOWED: &str = "<h1>405 Method Not Allowed</h1>";
    pub const SERVER_ERROR: &str = "<h1>500 Internal Server Error</h1>";
    pub const THANK_YOU: &str = "<h1>Thank you!</h1><p>Your message has been received.</p>";
    pub const SERVICE_UNAVAILABLE: &str = "<h1>503 Service Unavailable</h1>";
    pub const AUTH_REQUIRED: &str = "<!DOCTYPE html><html lang='en'><head><meta charset='utf-8'>\
        <title>Access denied</title></head><body>\
        <h1>🔒 Authentication Required</h1>\
        <p>Please login to access the admin section.</p>\
        <p><a href='/'>Return to Home</a></p>\
        </body></html>";

    /// `<h1>{code} {reason}</h1>` for client errors without a dedicated page.
    pub fn status_page(status: u16) -> String {
        format!("<h1>{} {}</h1>", status, super::status_reason(status))
    }
}
