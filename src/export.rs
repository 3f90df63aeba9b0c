use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::prompt::PromptMode;

/// Shown in the output pane before any question has been asked.
pub const PLACEHOLDER: &str = "The answer will appear here.";
/// Shown when the user submits without typing a question.
pub const EMPTY_QUESTION: &str = "Please enter a question.";

pub const CSV_MIME: &str = "text/csv;charset=utf-8";
pub const TEXT_MIME: &str = "text/plain;charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("there is no result to export yet")]
    NothingToExport,
}

/// A displayed string counts as a real result only once it is neither empty
/// nor one of the two fixed status sentinels. Copy and export share this
/// check.
pub fn is_real_result(text: &str) -> bool {
    !text.is_empty() && text != PLACEHOLDER && text != EMPTY_QUESTION
}

/// Turn the displayed result into a downloadable artifact. The dictionary
/// mode produces CSV, everything else plain text. `now` is passed in so the
/// filename is the caller's clock, not a hidden one.
pub fn format(
    result: &str,
    mode: &PromptMode,
    now: DateTime<Utc>,
) -> Result<ExportArtifact, ExportError> {
    if !is_real_result(result) {
        return Err(ExportError::NothingToExport);
    }

    let (bytes, mime_type, extension) = if mode.is_dictionary_csv() {
        (to_csv(result).into_bytes(), CSV_MIME, "csv")
    } else {
        (result.as_bytes().to_vec(), TEXT_MIME, "txt")
    };

    Ok(ExportArtifact {
        bytes,
        mime_type,
        filename: filename(now, extension),
    })
}

// Lines without a `;` are dropped. Splitting happens at the first `;` only,
// so definitions may themselves contain semicolons. Fields are quoted in a
// single pass; embedded double quotes are left alone.
fn to_csv(result: &str) -> String {
    let mut rows = vec!["term,definition".to_string()];

    for line in result.lines() {
        if let Some((term, definition)) = line.split_once(';') {
            rows.push(format!("\"{}\",\"{}\"", term.trim(), definition.trim()));
        }
    }

    rows.join("\n")
}

// ISO-8601 instant with `:` and `.` swapped out so the name is safe on every
// filesystem.
fn filename(now: DateTime<Utc>, extension: &str) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("answer_{}.{}", stamp, extension)
}

/// Where finished artifacts go. The production sink writes files; tests
/// substitute an in-memory one.
pub trait ArtifactSink {
    fn save(&self, artifact: &ExportArtifact) -> Result<()>;
}

pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: PathBuf) -> Self {
        DirSink { dir }
    }
}

impl ArtifactSink for DirSink {
    fn save(&self, artifact: &ExportArtifact) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.filename);
        fs::write(&path, &artifact.bytes)?;
        eprintln!("[Export] saved {} ({})", path.display(), artifact.mime_type);
        Ok(())
    }
}
