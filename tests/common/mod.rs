//! Shared fixtures for the integration tests: a throwaway site, a running
//! server bound to `127.0.0.1:0`, and a raw HTTP client.

#![allow(dead_code)]

use contactd::config::ServerConfig;
use contactd::{AppService, HttpServer, ServerHandle};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const ADMIN_AUTH: &str = "Basic YWRtaW46YWRtaW4="; // admin:admin

pub const ADMIN_PAGE: &str = "<html><body><h1>Submissions</h1>\n<!-- ENTRIES -->\n</body></html>";

/// A document root plus a submissions file, removed on drop.
pub struct TestSite {
    pub dir: TempDir,
}

impl TestSite {
    /// An empty document root.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("www")).unwrap();
        Self { dir }
    }

    /// A document root with the usual pages.
    pub fn standard() -> Self {
        let site = Self::empty();
        site.write("index.html", b"<h1>Home</h1>");
        site.write("404.html", b"<h1>Custom not found</h1>");
        site.write("thankyou.html", b"<h1>Thanks, really</h1>");
        site.write("admin.html", ADMIN_PAGE.as_bytes());
        site.write("css/site.css", b"body { color: #333; }");
        site.write("js/app.js", b"console.log('hi');");
        site.write("img/logo.png", &[0x89, b'P', b'N', b'G', 0, 1, 2, 3, 255]);
        site
    }

    pub fn web_root(&self) -> PathBuf {
        self.dir.path().join("www")
    }

    pub fn submissions_file(&self) -> PathBuf {
        self.dir.path().join("submissions.txt")
    }

    pub fn write(&self, rel: &str, contents: &[u8]) {
        let path = self.web_root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub fn submissions(&self) -> String {
        fs::read_to_string(self.submissions_file()).unwrap_or_default()
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            web_root: self.web_root(),
            submissions_file: self.submissions_file(),
            ..ServerConfig::default()
        }
    }
}

/// Running server, stopped on drop.
pub struct TestServer {
    handle: Option<ServerHandle>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub fn start(config: ServerConfig) -> Self {
        let addr = config.bind_addr();
        let service = AppService::new(Arc::new(config)).unwrap();
        let handle = HttpServer(Arc::new(service)).start(addr.as_str()).unwrap();
        handle.wait_ready().unwrap();
        let addr = handle.addr();
        Self {
            handle: Some(handle),
            addr,
        }
    }

    /// Send raw bytes and read until the server closes the connection.
    pub fn send(&self, raw: &[u8]) -> HttpResponse {
        send_raw(&self.addr, raw)
    }

    pub fn get(&self, path: &str) -> HttpResponse {
        self.send(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
    }

    pub fn get_admin(&self, authorization: Option<&str>) -> HttpResponse {
        let auth = authorization
            .map(|v| format!("Authorization: {v}\r\n"))
            .unwrap_or_default();
        self.send(format!("GET /admin HTTP/1.1\r\nHost: localhost\r\n{auth}\r\n").as_bytes())
    }

    pub fn post_form(&self, path: &str, body: &str) -> HttpResponse {
        self.send(
            format!(
                "POST {path} HTTP/1.1\r\nHost: localhost\r\n\
                 Content-Type: application/x-www-form-urlencoded\r\n\
                 Content-Length: {}\r\n\r\n{body}",
                body.len()
            )
            .as_bytes(),
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

pub fn send_raw(addr: &SocketAddr, raw: &[u8]) -> HttpResponse {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw).unwrap();
    read_response(&mut stream)
}

pub fn read_response(stream: &mut TcpStream) -> HttpResponse {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(e) => panic!("read error after {} bytes: {e:?}", buf.len()),
        }
    }
    HttpResponse::parse(&buf)
}

/// A response as it came off the wire.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn parse(raw: &[u8]) -> Self {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap_or_else(|| panic!("no header terminator in {:?}", String::from_utf8_lossy(raw)));
        let head = std::str::from_utf8(&raw[..split]).unwrap();
        let body = raw[split + 4..].to_vec();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap();
        let mut parts = status_line.splitn(3, ' ');
        assert_eq!(parts.next(), Some("HTTP/1.1"));
        let status = parts.next().unwrap().parse().unwrap();
        let reason = parts.next().unwrap_or("").to_string();
        let headers = lines
            .map(|l| {
                let (k, v) = l.split_once(':').unwrap();
                (k.trim().to_string(), v.trim().to_string())
            })
            .collect();
        Self {
            status,
            reason,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Framing every response must satisfy.
    pub fn assert_framed(&self) {
        let declared: usize = self
            .header("Content-Length")
            .expect("Content-Length missing")
            .parse()
            .unwrap();
        assert_eq!(declared, self.body.len(), "Content-Length mismatch");
        assert_eq!(self.header("Connection"), Some("close"));
    }
}

pub fn file_len(path: &Path) -> usize {
    fs::metadata(path).unwrap().len() as usize
}
