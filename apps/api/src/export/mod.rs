//! Document exporters: DOCX (OOXML package via zip + quick-xml) and PDF (lopdf).
//!
//! Both builders are synchronous and run to completion in memory; a failure
//! never yields a partial file.

pub mod docx;
pub mod handlers;
pub mod pdf;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "Makalah";
pub const FALLBACK_FILENAME: &str = "makalah";

static UNSAFE_FILENAME_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("filename pattern is valid"));

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF generation error: {0}")]
    Pdf(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download filename stem for `title`: every run of characters outside
/// `[A-Za-z0-9_-]` becomes a single `-`. An empty result becomes `makalah`.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = UNSAFE_FILENAME_RUN.replace_all(title, "-");
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_collapses_runs() {
        assert_eq!(sanitize_filename("Makalah Energi: Bab I"), "Makalah-Energi-Bab-I");
        assert_eq!(sanitize_filename("a_b-c"), "a_b-c");
    }

    #[test]
    fn test_sanitize_filename_non_ascii() {
        assert_eq!(sanitize_filename("Étude"), "-tude");
    }

    #[test]
    fn test_sanitize_filename_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "makalah");
    }
}
