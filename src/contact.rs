use crate::config::Limits;
use crate::error::ServerError;
use crate::server::connection::{Connection, Deadline};
use crate::server::request::Request;
use crate::server::response::{fallback, Response};
use crate::static_files::StaticFiles;
use crate::submissions::{Submission, SubmissionStore};
use tracing::{debug, info};

/// The only path that accepts POST.
pub const CONTACT_PATH: &str = "/contact";

const THANK_YOU_PAGE: &str = "thankyou.html";

/// Complete `req.body` up to its declared `Content-Length`.
///
/// `Content-Length` is required, even for an empty form, so the outcome
/// never depends on how the client's bytes were split into segments. The
/// declared length is checked against `max_body_bytes` before any further
/// read; extra bytes beyond the declared length are dropped.
pub fn read_body<C: Connection + ?Sized>(
    conn: &mut C,
    req: &mut Request,
    limits: &Limits,
    deadline: &Deadline,
) -> Result<(), ServerError> {
    let declared = req
        .content_length()?
        .ok_or(ServerError::MissingContentLength)?;
    if declared > limits.max_body_bytes {
        return Err(ServerError::PayloadTooLarge {
            declared,
            limit: limits.max_body_bytes,
        });
    }

    let mut chunk = [0u8; 4096];
    while req.body.len() < declared {
        let want = (declared - req.body.len()).min(chunk.len());
        let n = deadline.read(conn, &mut chunk[..want])?;
        if n == 0 {
            return Err(ServerError::IncompleteBody {
                expected: declared,
                received: req.body.len(),
            });
        }
        req.body.extend_from_slice(&chunk[..n]);
    }
    req.body.truncate(declared);
    debug!(content_length = declared, "Request body read");
    Ok(())
}

/// Form Submission Handler for `POST` requests.
pub struct ContactHandler<'a> {
    pub files: &'a StaticFiles,
    pub store: &'a SubmissionStore,
    pub limits: &'a Limits,
}

impl ContactHandler<'_> {
    /// Record a contact form submission and answer with the thank-you page.
    ///
    /// Any path other than `/contact` is a 404 and its body is never read.
    pub fn handle<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        mut req: Request,
        deadline: &Deadline,
    ) -> Result<Response, ServerError> {
        if req.path() != CONTACT_PATH {
            return Ok(Response::html(404, fallback::NOT_FOUND_SHORT));
        }

        read_body(conn, &mut req, self.limits, deadline)?;
        let submission = Submission::from_form(&req.body);
        self.store.append(&submission)?;
        info!(
            name_len = submission.name.len(),
            message_len = submission.message.len(),
            "Contact submission stored"
        );

        self.files.page_or(THANK_YOU_PAGE, 200, fallback::THANK_YOU)
    }
}
