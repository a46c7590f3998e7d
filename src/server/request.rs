use super::connection::{Connection, Deadline};
use crate::config::Limits;
use crate::error::ServerError;
use tracing::debug;

const READ_CHUNK: usize = 4096;

/// A parsed HTTP request.
///
/// Grammar: a request line `METHOD TARGET VERSION`, header lines up to the
/// first blank line, and whatever bytes followed the blank line in the same
/// reads as the start of the body. The body is only completed (up to
/// `Content-Length`) by handlers that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method token, e.g. `GET`
    pub method: String,
    /// Request target as sent, query string included
    pub target: String,
    /// Protocol version token; accepted but not interpreted
    pub version: String,
    /// Header lines in arrival order, names as sent
    pub headers: Vec<(String, String)>,
    /// Body bytes read so far
    pub body: Vec<u8>,
}

impl Request {
    /// Target with any query component removed.
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("/")
    }

    /// Case-insensitive header lookup. The last occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared body length, `None` when the header is absent.
    ///
    /// The value must be `1*DIGIT`; signs, blanks and anything else are
    /// rejected.
    pub fn content_length(&self) -> Result<Option<usize>, ServerError> {
        let Some(raw) = self.header("content-length") else {
            return Ok(None);
        };
        let digits = raw.trim();
        let invalid = || ServerError::InvalidContentLength {
            value: raw.to_string(),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<usize>().map(Some).map_err(|_| invalid())
    }

    /// `METHOD TARGET VERSION`, for logs.
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.target, self.version)
    }
}

/// Offset of the `\r\n\r\n` separating head from body.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse a request head (everything before the blank line).
pub fn parse_head(head: &str) -> Result<Request, ServerError> {
    let mut lines = head.lines();
    let request_line = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ServerError::malformed("missing request line"))?;

    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| ServerError::malformed("missing method"))?;
    let target = parts
        .next()
        .ok_or_else(|| ServerError::malformed("missing request target"))?;
    let version = parts
        .next()
        .ok_or_else(|| ServerError::malformed("missing protocol version"))?;
    if parts.next().is_some() {
        return Err(ServerError::malformed("extra tokens in request line"));
    }

    let mut headers = Vec::new();
    for line in lines {
        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
            _ => debug!(line = %line, "Skipping header line without a name"),
        }
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        body: Vec::new(),
    })
}

/// Parse a raw buffer holding a complete head and possibly the start of a body.
///
/// A buffer without a blank line is treated as head only.
pub fn parse_request(buf: &[u8]) -> Result<Request, ServerError> {
    let (head, body) = match find_head_end(buf) {
        Some(end) => (&buf[..end], &buf[end + 4..]),
        None => (buf, &[][..]),
    };
    let mut req = parse_head(&String::from_utf8_lossy(head))?;
    req.body = body.to_vec();
    Ok(req)
}

/// Read and parse one request from a connection.
///
/// Returns `Ok(None)` when the peer closed the connection without sending
/// anything. Reads stop as soon as the blank line is seen; the body is left
/// for the handler to complete.
pub fn read_request<C: Connection + ?Sized>(
    conn: &mut C,
    limits: &Limits,
    deadline: &Deadline,
) -> Result<Option<Request>, ServerError> {
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(end) = find_head_end(&buf) {
            if end > limits.max_header_bytes {
                return Err(ServerError::HeadersTooLarge {
                    limit: limits.max_header_bytes,
                });
            }
            break;
        }
        if buf.len() > limits.max_header_bytes {
            return Err(ServerError::HeadersTooLarge {
                limit: limits.max_header_bytes,
            });
        }
        let n = deadline.read(conn, &mut chunk)?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            debug!(bytes = buf.len(), "Peer closed before blank line");
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    debug!(bytes = buf.len(), "Request head read");
    parse_request(&buf).map(Some)
}
