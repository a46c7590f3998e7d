//! Admin view: the submissions log rendered into `admin.html`.
//!
//! Each non-blank record becomes a numbered card with one paragraph per
//! stored line. Cards are rendered through a `minijinja` template whose
//! `.html` name turns on HTML auto-escaping, so submitted text is always
//! displayed, never interpreted. The joined cards replace the
//! `<!-- ENTRIES -->` marker in the document root's `admin.html`.

use crate::error::ServerError;
use crate::server::response::{Response, HTML_UTF8};
use crate::static_files::StaticFiles;
use crate::submissions::SubmissionStore;
use minijinja::{context, Environment};
use tracing::debug;

/// Placeholder in `admin.html` replaced by the rendered cards.
pub const ENTRIES_MARKER: &str = "<!-- ENTRIES -->";

/// Template file in the document root.
pub const ADMIN_TEMPLATE: &str = "admin.html";

const CARD_NAME: &str = "card.html";
const CARD_TEMPLATE: &str = "<div class='card mb-3'><div class='card-body'>\n\
<h5 class='card-title'># {{ number }}</h5>\n\
{% for line in lines %}<p class='card-text'>{{ line }}</p>\n{% endfor %}\
</div></div>";

pub struct AdminView {
    env: Environment<'static>,
}

impl AdminView {
    pub fn new() -> Result<Self, ServerError> {
        let mut env = Environment::new();
        env.add_template(CARD_NAME, CARD_TEMPLATE)?;
        Ok(Self { env })
    }

    /// One card per record, numbered from 1, joined by newlines.
    pub fn render_cards(&self, records: &[Vec<String>]) -> Result<String, ServerError> {
        let tmpl = self.env.get_template(CARD_NAME)?;
        let cards = records
            .iter()
            .enumerate()
            .map(|(i, lines)| tmpl.render(context! { number => i + 1, lines => lines }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards.join("\n"))
    }

    /// Substitute rendered cards into the page template.
    pub fn render_page(&self, template: &str, records: &[Vec<String>]) -> Result<String, ServerError> {
        Ok(template.replace(ENTRIES_MARKER, &self.render_cards(records)?))
    }

    /// Answer an admitted `GET /admin`.
    ///
    /// A missing `admin.html` is an error, answered by the caller with 500.
    pub fn respond(
        &self,
        files: &StaticFiles,
        store: &SubmissionStore,
    ) -> Result<Response, ServerError> {
        let (template, _) = files.load(ADMIN_TEMPLATE)?;
        let template = String::from_utf8_lossy(&template);
        let records = store.records()?;
        let page = self.render_page(&template, &records)?;
        debug!(records = records.len(), "Admin view rendered");
        Ok(Response::with_body(200, HTML_UTF8, page.into_bytes()))
    }
}
