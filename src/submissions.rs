//! Append-only store of contact form submissions.
//!
//! On disk each record is three lines followed by a separator line:
//!
//! ```text
//! Name: Alice
//! Email: a@example.com
//! Message: Hi
//! ---
//! ```
//!
//! Field values are written as submitted. A message that itself contains a
//! line reading `---` will be read back as two records.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub const RECORD_SEPARATOR: &str = "---";

/// One contact form entry. Fields may be empty and are not validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl Submission {
    /// Decode an `application/x-www-form-urlencoded` body.
    ///
    /// The first occurrence of each field is used; absent fields are empty.
    pub fn from_form(body: &[u8]) -> Self {
        let mut sub = Submission::default();
        let (mut name, mut email, mut message) = (false, false, false);
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "name" if !name => {
                    sub.name = value.into_owned();
                    name = true;
                }
                "email" if !email => {
                    sub.email = value.into_owned();
                    email = true;
                }
                "message" if !message => {
                    sub.message = value.into_owned();
                    message = true;
                }
                _ => {}
            }
        }
        sub
    }

    /// The on-disk record, separator line included.
    pub fn to_record(&self) -> String {
        format!(
            "Name: {}\nEmail: {}\nMessage: {}\n{}\n",
            self.name, self.email, self.message, RECORD_SEPARATOR
        )
    }
}

/// Split store contents into non-blank record blocks, in store order.
///
/// Blocks are separated by lines consisting only of `---`. Leading and
/// trailing blank lines of a block are dropped.
pub fn parse_records(contents: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in contents.lines() {
        if line.trim() == RECORD_SEPARATOR {
            push_block(&mut records, std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    push_block(&mut records, current);
    records
}

fn push_block(records: &mut Vec<Vec<String>>, block: Vec<String>) {
    let start = block.iter().position(|l| !l.trim().is_empty());
    let end = block.iter().rposition(|l| !l.trim().is_empty());
    if let (Some(start), Some(end)) = (start, end) {
        records.push(block[start..=end].to_vec());
    }
}

/// The submissions log file.
///
/// Appends are serialized through a mutex and go through an append-mode
/// handle, so records from concurrent workers never interleave.
#[derive(Debug)]
pub struct SubmissionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SubmissionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file if needed.
    pub fn append(&self, submission: &Submission) -> io::Result<()> {
        let record = submission.to_record();
        // The lock guards no data, so a poisoned lock is still usable.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.as_bytes())?;
        file.flush()?;
        debug!(path = %self.path.display(), bytes = record.len(), "Submission appended");
        Ok(())
    }

    /// Every non-blank record in the store. A missing file has no records.
    pub fn records(&self) -> io::Result<Vec<Vec<String>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(parse_records(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
