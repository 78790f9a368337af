//! Text extraction from source documents.
//!
//! Unsupported extensions yield empty text rather than an error; the
//! caller does not validate file types, so a stray file in the resume
//! folder simply scores as an empty candidate.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub fn extract_text(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => pdf_extract::extract_text(path)
            .with_context(|| format!("failed to extract text from {}", path.display())),
        "txt" | "text" | "md" => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_txt_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "Seven years of Rust.").unwrap();
        assert_eq!(extract_text(&path).unwrap(), "Seven years of Rust.\n");
    }

    #[test]
    fn test_unsupported_extension_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.docx");
        fs::write(&path, b"not really a docx").unwrap();
        assert_eq!(extract_text(&path).unwrap(), "");
    }

    #[test]
    fn test_no_extension_yields_empty_text() {
        // the file does not even need to exist
        assert_eq!(extract_text(Path::new("/nonexistent/resume")).unwrap(), "");
    }

    #[test]
    fn test_missing_txt_file_is_an_error() {
        assert!(extract_text(Path::new("/nonexistent/resume.txt")).is_err());
    }
}
