use super::connection::{Connection, Deadline};
use super::request::{read_request, Request};
use super::response::{fallback, Response};
use crate::admin::AdminView;
use crate::config::ServerConfig;
use crate::contact::ContactHandler;
use crate::error::ServerError;
use crate::security::{challenge_response, BasicAuthProvider, SecurityProvider, SecurityRequest};
use crate::static_files::StaticFiles;
use crate::submissions::SubmissionStore;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Path of the password-protected admin view.
pub const ADMIN_PATH: &str = "/admin";

const SERVER_ERROR_PAGE: &str = "500.html";

/// The request dispatcher.
///
/// Owns every component a request can reach and is shared read-only by
/// all connection handlers.
pub struct AppService {
    config: Arc<ServerConfig>,
    files: StaticFiles,
    store: SubmissionStore,
    auth: Box<dyn SecurityProvider>,
    admin: AdminView,
}

impl AppService {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, ServerError> {
        let auth = BasicAuthProvider::new(
            config.admin.username.clone(),
            config.admin.password.clone(),
        );
        Ok(Self {
            files: StaticFiles::new(config.web_root.clone()),
            store: SubmissionStore::new(config.submissions_file.clone()),
            auth: Box::new(auth),
            admin: AdminView::new()?,
            config,
        })
    }

    /// Replace the authentication provider.
    pub fn with_security_provider(mut self, provider: Box<dyn SecurityProvider>) -> Self {
        self.auth = provider;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Route a parsed request to its handler.
    ///
    /// | Method | Path       | Handler                              |
    /// |--------|------------|--------------------------------------|
    /// | GET    | `/admin`   | Basic-Auth gate, then admin view     |
    /// | GET    | any other  | static files                         |
    /// | POST   | any        | contact form (404 unless `/contact`) |
    /// | other  | any        | 405                                  |
    pub fn route<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        req: Request,
        deadline: &Deadline,
    ) -> Result<Response, ServerError> {
        match (req.method.as_str(), req.path()) {
            ("GET", ADMIN_PATH) => {
                if self.auth.validate(&SecurityRequest {
                    headers: &req.headers,
                }) {
                    self.admin.respond(&self.files, &self.store)
                } else {
                    debug!("Admin credentials missing or rejected");
                    Ok(challenge_response())
                }
            }
            ("GET", path) => self.files.serve(path),
            ("POST", _) => ContactHandler {
                files: &self.files,
                store: &self.store,
                limits: &self.config.limits,
            }
            .handle(conn, req, deadline),
            _ => Ok(Response::html(405, fallback::METHOD_NOT_ALLOWED).header("Allow", "GET, POST")),
        }
    }

    /// Response for a failed request.
    ///
    /// Client errors get a one-line page; server errors get `500.html` if the
    /// document root has one, and the built-in page otherwise (including when
    /// reading `500.html` fails too).
    pub fn error_response(&self, err: &ServerError) -> Response {
        if err.is_client_error() {
            let status = err.status();
            return Response::html(status, fallback::status_page(status));
        }
        self.server_error_response()
    }

    fn server_error_response(&self) -> Response {
        self.files
            .page_or(SERVER_ERROR_PAGE, 500, fallback::SERVER_ERROR)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load 500 page");
                Response::html(500, fallback::SERVER_ERROR)
            })
    }

    /// Read one request and build its response.
    ///
    /// Returns the request line (empty if the head never parsed) with the
    /// response, or `None` when the client closed without sending anything.
    fn respond<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        peer: &str,
        deadline: &Deadline,
    ) -> Option<(String, Response)> {
        let mut line = String::new();
        let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<Option<Response>, ServerError> {
            let Some(req) = read_request(conn, &self.config.limits, deadline)? else {
                return Ok(None);
            };
            line = req.request_line();
            info!(peer = %peer, request = %line, "Request received");
            self.route(conn, req, deadline).map(Some)
        }));

        let response = match outcome {
            Ok(Ok(Some(res))) => res,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                if e.is_client_error() {
                    warn!(peer = %peer, request = %line, status = e.status(), error = %e, "Rejected request");
                } else {
                    error!(peer = %peer, request = %line, error = %e, "Error handling request");
                }
                self.error_response(&e)
            }
            Err(panic) => {
                error!(peer = %peer, request = %line, panic_message = ?panic, "Request handler panicked");
                self.server_error_response()
            }
        };
        Some((line, response))
    }

    /// Read, route and answer exactly one request on `conn`.
    ///
    /// Errors and panics are converted into responses here; nothing escapes
    /// to the accept loop. The caller closes the connection afterwards.
    pub fn handle_connection<C: Connection + ?Sized>(&self, conn: &mut C, peer: &str) {
        let started = Instant::now();
        let deadline = Deadline::after(self.config.limits.read_timeout());

        let Some((line, response)) = self.respond(conn, peer, &deadline) else {
            debug!(peer = %peer, "Connection closed without a request");
            return;
        };

        if let Err(e) = response.write_to(conn) {
            warn!(peer = %peer, error = %e, "Failed to write response");
            return;
        }
        info!(
            peer = %peer,
            request = %line,
            status = response.status,
            bytes = response.body_bytes().len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Response sent"
        );
    }
}
