//! Hostile and malformed input: traversal, markup injection, oversized
//! heads and bodies, bad framing and slow clients.

mod common;

use common::{TestServer, TestSite, ADMIN_AUTH};
use contactd::config::ConcurrencyMode;
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

fn site_with_secret() -> TestSite {
    let site = TestSite::standard();
    std::fs::write(site.dir.path().join("secret.txt"), "top secret").unwrap();
    site
}

#[test]
fn test_traversal_is_404() {
    let site = site_with_secret();
    let server = TestServer::start(site.config());
    for path in [
        "/../secret.txt",
        "/css/../../secret.txt",
        "/%2e%2e/secret.txt",
        "/%2E%2E%2Fsecret.txt",
        "/..%2fsecret.txt",
        "/./../secret.txt",
    ] {
        let res = server.get(path);
        assert_eq!(res.status, 404, "{path}");
        assert!(!res.text().contains("top secret"), "{path}");
    }
}

#[test]
fn test_dot_segments_inside_root_do_not_escape() {
    let site = site_with_secret();
    let server = TestServer::start(site.config());
    let res = server.get("/css/../index.html");
    assert!(res.status == 200 || res.status == 404);
    assert!(!res.text().contains("top secret"));
}

#[cfg(unix)]
#[test]
fn test_symlink_out_of_root_is_404() {
    let site = site_with_secret();
    std::os::unix::fs::symlink(
        site.dir.path().join("secret.txt"),
        site.web_root().join("leak.txt"),
    )
    .unwrap();
    let server = TestServer::start(site.config());
    let res = server.get("/leak.txt");
    assert_eq!(res.status, 404);
    assert!(!res.text().contains("top secret"));
}

#[test]
fn test_submitted_markup_is_escaped_in_admin() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    let body = "name=%3Cb%3EMallory%3C%2Fb%3E&email=m%40x.org\
                &message=%3Cscript%3Ealert(1)%3C%2Fscript%3E";
    assert_eq!(server.post_form("/contact", body).status, 200);
    // Stored verbatim.
    assert!(site.submissions().contains("Message: <script>alert(1)</script>"));

    let html = server.get_admin(Some(ADMIN_AUTH)).text();
    assert!(!html.contains("<script>"));
    assert!(!html.contains("<b>Mallory"));
    assert!(html.contains("&lt;script&gt;alert(1)"));
    assert!(html.contains("&lt;b&gt;Mallory"));
}

#[test]
fn test_malformed_request_line_is_400() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    for raw in [
        "HELLO\r\n\r\n",
        "GET /\r\n\r\n",
        "GET / HTTP/1.1 extra\r\n\r\n",
    ] {
        let res = server.send(raw.as_bytes());
        assert_eq!(res.status, 400, "{raw:?}");
        res.assert_framed();
        assert_eq!(res.text(), "<h1>400 Bad Request</h1>");
    }
}

#[test]
fn test_invalid_content_length_is_400() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    for value in ["abc", "-5", "+6", "1.5", "", "0x10"] {
        let res = server.send(
            format!("POST /contact HTTP/1.1\r\nContent-Length: {value}\r\n\r\nname=x").as_bytes(),
        );
        assert_eq!(res.status, 400, "Content-Length: {value:?}");
    }
    assert_eq!(site.submissions(), "");
}

#[test]
fn test_missing_content_length_with_body_is_400() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    let res = server.send(b"POST /contact HTTP/1.1\r\nHost: x\r\n\r\nname=Eve&email=e&message=m");
    assert_eq!(res.status, 400);
    assert_eq!(site.submissions(), "");
}

#[test]
fn test_missing_content_length_is_400_regardless_of_segmentation() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());

    // Head and body in separate writes.
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(b"POST /contact HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    stream.flush().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    // Answered from the head alone; the late body is never stored.
    let res = common::read_response(&mut stream);
    assert_eq!(res.status, 400);
    // May fail: the server has already closed its side.
    let _late = stream.write_all(b"name=Eve&email=e&message=m");

    // No body at all.
    let res = server.send(b"POST /contact HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(res.status, 400);
    assert_eq!(site.submissions(), "");
}

#[test]
fn test_zero_content_length_records_empty_submission() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    let res = server.send(b"POST /contact HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    assert_eq!(res.status, 200);
    assert_eq!(site.submissions(), "Name: \nEmail: \nMessage: \n---\n");
}

#[test]
fn test_body_shorter_than_declared_is_400() {
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
        .write_all(b"POST /contact HTTP/1.1\r\nContent-Length: 50\r\n\r\nname=x")
        .unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let res = common::read_response(&mut stream);
    assert_eq!(res.status, 400);
    assert_eq!(site.submissions(), "");
}

#[test]
fn test_oversized_body_is_413() {
    let site = TestSite::standard();
    let mut config = site.config();
    config.limits.max_body_bytes = 1024;
    let server = TestServer::start(config);
    let res = server.send(b"POST /contact HTTP/1.1\r\nContent-Length: 1025\r\n\r\nname=x");
    assert_eq!(res.status, 413);
    res.assert_framed();
    assert_eq!(res.reason, "Payload Too Large");
    assert_eq!(site.submissions(), "");

    // At the limit is fine.
    let body = format!("name=ok&email=e&message={}", "m".repeat(1024 - 24));
    assert_eq!(body.len(), 1024);
    assert_eq!(server.post_form("/contact", &body).status, 200);
}

#[test]
fn test_oversized_head_is_431() {
    let site = TestSite::standard();
    let mut config = site.config();
    config.limits.max_header_bytes = 1024;
    let server = TestServer::start(config);
    let raw = format!(
        "GET / HTTP/1.1\r\nX-Padding: {}\r\n\r\n",
        "a".repeat(4000)
    );
    let res = server.send(raw.as_bytes());
    assert_eq!(res.status, 431);
    res.assert_framed();
}

#[test]
fn test_stalled_client_gets_408() {
    let site = TestSite::standard();
    let mut config = site.config();
    config.limits.read_timeout_ms = 300;
    let server = TestServer::start(config);

    let started = Instant::now();
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(b"GET /index.html HTTP/1.1\r\n").unwrap();
    let res = common::read_response(&mut stream);
    assert_eq!(res.status, 408);
    assert!(started.elapsed() < Duration::from_secs(3));

    // The server is still serving afterwards.
    assert_eq!(server.get("/").status, 200);
}

#[test]
fn test_slow_body_gets_408() {
    let site = TestSite::standard();
    let mut config = site.config();
    config.limits.read_timeout_ms = 300;
    let server = TestServer::start(config);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
        .write_all(b"POST /contact HTTP/1.1\r\nContent-Length: 40\r\n\r\nname=")
        .unwrap();
    let res = common::read_response(&mut stream);
    assert_eq!(res.status, 408);
    assert_eq!(site.submissions(), "");
}

#[test]
fn test_trickling_client_does_not_hold_accept_loop() {
    let site = TestSite::standard();
    let mut config = site.config();
    config.concurrency.mode = ConcurrencyMode::Sequential;
    config.limits.read_timeout_ms = 300;
    let server = TestServer::start(config);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(common::read_response(&mut stream).status, 200);

    // Keep sending a byte at a time after the response, for far longer than
    // any read budget.
    let trickle = std::thread::spawn(move || {
        for _ in 0..60 {
            if stream.write_all(b"x").is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    });

    let started = Instant::now();
    assert_eq!(server.get("/index.html").status, 200);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "second client waited {:?}",
        started.elapsed()
    );
    trickle.join().unwrap();
}

#[test]
fn test_500_page_from_document_root() {
    let site = TestSite::empty();
    site.write("500.html", b"<h1>Our fault</h1>");
    let server = TestServer::start(site.config());
    let res = server.get_admin(Some(ADMIN_AUTH));
    assert_eq!(res.status, 500);
    assert_eq!(res.text(), "<h1>Our fault</h1>");
}

#[test]
fn test_connection_closed_without_request_gets_no_response() {
    use std::io::Read;
    let site = TestSite::standard();
    let server = TestServer::start(site.config());
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    assert!(buf.is_empty());
}
