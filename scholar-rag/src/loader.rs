//! Document loading from the filesystem.
//!
//! Plain text and markdown are read verbatim. PDFs are reduced to text with
//! the `pdftotext` binary from poppler; layout is not preserved.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::{Document, DocumentFormat};
use crate::error::{RagError, Result};

/// External binary used for PDF text extraction.
const PDFTOTEXT: &str = "pdftotext";

/// Load a single file, using its path as the document id.
///
/// # Errors
///
/// - [`RagError::UnsupportedFormat`] if the extension is not `txt`, `md`,
///   `markdown` or `pdf`.
/// - [`RagError::ReadError`] if the file cannot be read, is not valid UTF-8,
///   or PDF extraction fails.
pub fn load_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    load_with_id(path, path.to_string_lossy().replace('\\', "/"))
}

/// Load a file found under `root`, using its root-relative path as the id.
///
/// Ids stay stable across runs as long as the directory layout does, which
/// is what makes re-ingestion an upsert.
pub fn load_document_in(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let id = path.strip_prefix(root.as_ref()).unwrap_or(path).to_string_lossy().replace('\\', "/");
    load_with_id(path, id)
}

/// List every non-hidden file below `root`, sorted by path.
///
/// Unsupported files are included so that callers can report them.
pub fn discover_documents(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(RagError::read(
            root,
            io::Error::new(io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

/// Load every file below `root`, in path order.
///
/// Each file gets its own result so that one unreadable or unsupported file
/// does not hide the rest of the directory.
///
/// # Errors
///
/// Fails only if `root` itself is not a readable directory.
pub fn load_directory(root: impl AsRef<Path>) -> Result<Vec<(PathBuf, Result<Document>)>> {
    let root = root.as_ref();
    let files = discover_documents(root)?;
    debug!(root = %root.display(), files = files.len(), "discovered files");
    Ok(files
        .into_iter()
        .map(|path| {
            let loaded = load_document_in(root, &path);
            (path, loaded)
        })
        .collect())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('.'))
}

fn load_with_id(path: &Path, id: String) -> Result<Document> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| RagError::UnsupportedFormat {
        path: path.to_path_buf(),
        format: path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<none>".to_string()),
    })?;

    let fs_meta = fs::metadata(path).map_err(|e| RagError::read(path, e))?;
    let text = match format {
        DocumentFormat::Text | DocumentFormat::Markdown => read_utf8(path)?,
        DocumentFormat::Pdf => extract_pdf_text(path)?,
    };

    let mut metadata = HashMap::new();
    if let Some(name) = path.file_name() {
        metadata.insert("file_name".to_string(), name.to_string_lossy().into_owned());
    }
    metadata.insert("file_path".to_string(), path.to_string_lossy().into_owned());
    metadata.insert("file_size".to_string(), fs_meta.len().to_string());
    metadata.insert("format".to_string(), format.to_string());
    if let Ok(modified) = fs_meta.modified() {
        metadata.insert("last_modified".to_string(), DateTime::<Utc>::from(modified).to_rfc3339());
    }

    debug!(document.id = %id, %format, chars = text.chars().count(), "loaded document");

    Ok(Document {
        id,
        text,
        format,
        metadata,
        source_uri: Some(path.to_string_lossy().into_owned()),
        ingested_at: Utc::now(),
    })
}

fn read_utf8(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| RagError::read(path, e))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| RagError::read(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

fn extract_pdf_text(path: &Path) -> Result<String> {
    let output = Command::new(PDFTOTEXT)
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| {
            let message = format!("{PDFTOTEXT} failed to start: {e} (is poppler installed?)");
            RagError::read(path, io::Error::new(e.kind(), message))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = format!("{PDFTOTEXT} exited with {}: {}", output.status, stderr.trim());
        return Err(RagError::read(path, io::Error::other(message)));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        return Err(RagError::read(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "no text extracted from PDF"),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_text_and_markdown_verbatim() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("a.txt"), "Obsidian is for networked thinking.\n").unwrap();
        fs::write(root.join("b.md"), "# Title\n\n* item\n").unwrap();

        let a = load_document_in(root, root.join("a.txt")).unwrap();
        assert_eq!(a.id, "a.txt");
        assert_eq!(a.text, "Obsidian is for networked thinking.\n");
        assert_eq!(a.format, DocumentFormat::Text);
        assert_eq!(a.metadata.get("file_name").map(String::as_str), Some("a.txt"));
        assert!(a.metadata.contains_key("last_modified"));

        let b = load_document(root.join("b.md")).unwrap();
        assert_eq!(b.text, "# Title\n\n* item\n");
        assert_eq!(b.format, DocumentFormat::Markdown);
    }

    #[test]
    fn rejects_unknown_extension() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sheet.xlsx");
        fs::write(&path, "binary").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat { ref format, .. } if format == "xlsx"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = load_document(temp.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, RagError::ReadError { .. }));
    }

    #[test]
    fn invalid_utf8_is_read_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.txt");
        fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();
        assert!(matches!(load_document(&path).unwrap_err(), RagError::ReadError { .. }));
    }

    #[test]
    fn discovery_is_sorted_recursive_and_skips_hidden() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("z.md"), "z").unwrap();
        fs::write(root.join("nested/a.txt"), "a").unwrap();
        fs::write(root.join(".hidden.txt"), "h").unwrap();
        fs::write(root.join(".git/config.txt"), "g").unwrap();
        fs::write(root.join("notes.docx"), "d").unwrap();

        let files = discover_documents(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["nested/a.txt", "notes.docx", "z.md"]);
    }

    #[test]
    fn directory_load_reports_each_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("b.csv"), "x,y").unwrap();

        let loaded = load_directory(root).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].1.as_ref().unwrap().id, "a.txt");
        assert!(matches!(loaded[1].1, Err(RagError::UnsupportedFormat { .. })));
    }

    #[test]
    fn discovery_of_missing_directory_fails() {
        let temp = tempfile::tempdir().unwrap();
        let err = discover_documents(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, RagError::ReadError { .. }));
    }
}
