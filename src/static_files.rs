use crate::error::ServerError;
use crate::server::response::{fallback, Response};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File store rooted at the document root.
///
/// URL paths are mapped component by component; anything that is not a
/// plain name (`..`, a root, a drive prefix) maps to nothing. The resolved
/// file is then canonicalized and must still live under the canonical root,
/// so symlinks cannot lead outside it either.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base_dir: base.into() }
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn confine(&self, path: &Path) -> io::Result<PathBuf> {
        let root = fs::canonicalize(&self.base_dir)?;
        let resolved = fs::canonicalize(path)?;
        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "outside document root"))
        }
    }

    /// Read a file by URL path, returning its bytes and content type.
    ///
    /// Missing files, directories, traversal attempts and escapes all come
    /// back as `NotFound`; other I/O errors pass through.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let path = self.confine(&path)?;
        let bytes = fs::read(&path)?;
        Ok((bytes, content_type(&path)))
    }

    /// Load one of the conventional pages (`404.html`, `thankyou.html`, ...).
    pub fn page(&self, name: &str) -> io::Result<Option<(Vec<u8>, &'static str)>> {
        match self.load(name) {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serve a conventional page with `status`, or `fallback_html` if absent.
    pub fn page_or(
        &self,
        name: &str,
        status: u16,
        fallback_html: &str,
    ) -> Result<Response, ServerError> {
        Ok(match self.page(name)? {
            Some((bytes, ct)) => Response::with_body(status, ct, bytes),
            None => Response::html(status, fallback_html),
        })
    }

    /// Answer `GET <url_path>`: the file with 200, or the 404 page.
    pub fn serve(&self, url_path: &str) -> Result<Response, ServerError> {
        let decoded = urlencoding::decode(url_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| url_path.to_string());
        let target = if decoded == "/" { "/index.html" } else { decoded.as_str() };

        match self.load(target) {
            Ok((bytes, ct)) => {
                debug!(path = %target, size_bytes = bytes.len(), content_type = %ct, "Static file served");
                Ok(Response::with_body(200, ct, bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %target, "Static file not found");
                self.not_found()
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 404 response: the document root's `404.html` or the built-in body.
    pub fn not_found(&self) -> Result<Response, ServerError> {
        self.page_or("404.html", 404, fallback::NOT_FOUND)
    }
}

/// Content type for a file, by extension.
///
/// Text types carry `; charset=utf-8`; unknown extensions are
/// `application/octet-stream`.
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "xml" => "application/xml; charset=utf-8",
        "svg" => "image/svg+xml; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "wasm" => "application/wasm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}
