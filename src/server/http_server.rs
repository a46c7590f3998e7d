use super::connection::Deadline;
use super::response::{fallback, Response};
use super::service::AppService;
use crate::config::ConcurrencyMode;
use crate::worker_pool::WorkerPool;
use std::io;
use std::net::{
    IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The transport: a TCP listener feeding connections to an [`AppService`].
///
/// Every connection carries exactly one request and is closed after the
/// response. Scheduling follows `concurrency.mode` in the service's config.
pub struct HttpServer(pub Arc<AppService>);

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it gracefully,
/// or joining the accept thread.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound (resolves port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if no connection succeeds within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(wake_addr(self.addr)).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting, finish in-flight connections and join the accept thread.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Unblock the pending accept() so the loop sees the flag.
        if let Err(e) = TcpStream::connect(wake_addr(self.addr)) {
            debug!(error = %e, "Wake-up connection failed; listener already gone");
        }
        if self.handle.join().is_err() {
            error!("Accept thread panicked");
        }
        info!(addr = %self.addr, "Server stopped");
    }

    /// Wait for the accept thread to complete
    ///
    /// # Errors
    ///
    /// Returns an error if the accept thread panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

impl HttpServer {
    /// Bind `addr` and start accepting on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let service = self.0;
        let flag = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("contactd-accept".to_string())
            .spawn(move || accept_loop(listener, service, flag))?;

        info!(addr = %addr, "Server listening at http://{addr}");
        Ok(ServerHandle {
            addr,
            shutdown,
            handle,
        })
    }
}

fn accept_loop(listener: TcpListener, service: Arc<AppService>, shutdown: Arc<AtomicBool>) {
    let concurrency = service.config().concurrency;
    let pool = match concurrency.mode {
        ConcurrencyMode::Sequential => None,
        ConcurrencyMode::Pool => {
            let worker_service = Arc::clone(&service);
            match WorkerPool::new("contactd", &concurrency, move |stream: TcpStream| {
                serve_stream(&worker_service, stream)
            }) {
                Ok(pool) => Some(pool),
                Err(e) => {
                    error!(error = %e, "Failed to start worker pool; serving sequentially");
                    None
                }
            }
        }
    };

    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };
        match &pool {
            None => serve_stream(&service, stream),
            Some(pool) => {
                if let Err(stream) = pool.submit(stream) {
                    shed(&service, stream);
                }
            }
        }
    }
    if let Some(pool) = pool {
        let metrics = pool.metrics();
        info!(
            dispatched = metrics.get_dispatched_count(),
            completed = metrics.get_completed_count(),
            shed = metrics.get_shed_count(),
            queued = metrics.get_queue_depth(),
            "Worker pool draining"
        );
        // Dropping the pool joins its workers after the queue drains.
        drop(pool);
    }
}

fn peer_label(stream: &TcpStream) -> String {
    stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Answer one connection, then close it.
fn serve_stream(service: &AppService, mut stream: TcpStream) {
    let peer = peer_label(&stream);
    if let Err(e) = stream.set_write_timeout(Some(service.config().limits.write_timeout())) {
        warn!(peer = %peer, error = %e, "Failed to set write timeout");
    }
    service.handle_connection(&mut stream, &peer);
    linger_close(stream, &peer);
}

const LINGER: Duration = Duration::from_millis(100);
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// Half-close, then discard whatever the client is still sending.
///
/// Closing a socket with unread input makes the kernel send RST, which can
/// destroy a response the client has not read yet (431, 413 and 400 are
/// written before the request is fully consumed). The whole drain is bounded
/// by one `LINGER` deadline, however the client paces its bytes.
fn linger_close(mut stream: TcpStream, peer: &str) {
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        debug!(peer = %peer, error = %e, "Shutdown after response failed");
        return;
    }
    let deadline = Deadline::after(LINGER);
    let mut sink = [0u8; 4096];
    let mut drained = 0;
    while drained < LINGER_MAX_BYTES {
        match deadline.read(&mut stream, &mut sink) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
    if drained > 0 {
        debug!(peer = %peer, bytes = drained, "Discarded unread input");
    }
}

/// Refuse a connection the pool had no room for.
fn shed(service: &AppService, mut stream: TcpStream) {
    let peer = peer_label(&stream);
    warn!(peer = %peer, "Worker queue full; shedding connection");
    if let Err(e) = stream.set_write_timeout(Some(service.config().limits.write_timeout())) {
        debug!(peer = %peer, error = %e, "Failed to set write timeout");
    }
    let response = Response::html(503, fallback::SERVICE_UNAVAILABLE).header("Retry-After", "1");
    if let Err(e) = response.write_to(&mut stream) {
        debug!(peer = %peer, error = %e, "Failed to write 503");
    }
    linger_close(stream, &peer);
}
