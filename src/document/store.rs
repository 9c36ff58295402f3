//! JSON directory store for documents.
//!
//! Each document is one `<id>.json` file. Reading can descend a fixed number of
//! subdirectory levels, matching layouts where every source database gets its
//! own folder.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::Document;

/// Errors from reading or writing the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The source directory does not exist.
    #[error("source directory not found: {path}")]
    NotFound {
        /// Missing directory.
        path: PathBuf,
    },

    /// Filesystem failure.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A file did not contain a valid document.
    #[error("invalid document JSON in {path}: {source}")]
    Json {
        /// Offending file.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Loads every document found `nesting_level` directories below `dir`.
///
/// `0` reads only `*.json` files directly inside `dir`; `1` reads files inside
/// each immediate subdirectory, and so on. Files are read in path order.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if `dir` does not exist, and IO or JSON
/// errors for unreadable or malformed files.
#[instrument(fields(dir = %dir.display()))]
pub fn read_documents(dir: &Path, nesting_level: usize) -> Result<Vec<Document>, StoreError> {
    if !dir.exists() {
        return Err(StoreError::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    collect_json_files(dir, nesting_level, &mut files)?;
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let raw = fs::read_to_string(file).map_err(|e| StoreError::io(file, e))?;
        let document: Document =
            serde_json::from_str(&raw).map_err(|e| StoreError::json(file, e))?;
        documents.push(document);
    }

    info!(count = documents.len(), "loaded documents");
    Ok(documents)
}

fn collect_json_files(
    dir: &Path,
    nesting_level: usize,
    files: &mut Vec<PathBuf>,
) -> Result<(), StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if nesting_level == 0 {
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        } else if path.is_dir() {
            collect_json_files(&path, nesting_level - 1, files)?;
        }
    }
    Ok(())
}

/// Options for [`write_documents`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Replace identifiers with random ones before writing.
    pub anonymise: bool,
    /// Also write the content as `<id>.txt`.
    pub text_copy: bool,
}

/// Writes each document as pretty-printed `<id>.json` under `dir`.
///
/// The directory is created if needed. Returns the number of documents written.
///
/// # Errors
///
/// Returns IO errors for directory creation or file writes.
#[instrument(skip(documents), fields(dir = %dir.display(), count = documents.len()))]
pub fn write_documents(
    dir: &Path,
    documents: &[Document],
    options: WriteOptions,
) -> Result<usize, StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    for document in documents {
        let mut document = document.clone();
        if options.anonymise {
            document.anonymise();
        }

        let json_path = dir.join(format!("{}.json", document.id));
        let serialized =
            serde_json::to_string_pretty(&document).map_err(|e| StoreError::json(&json_path, e))?;
        fs::write(&json_path, serialized).map_err(|e| StoreError::io(&json_path, e))?;

        if options.text_copy {
            let text_path = json_path.with_extension("txt");
            fs::write(&text_path, &document.content).map_err(|e| StoreError::io(&text_path, e))?;
        }
        debug!(path = %json_path.display(), "wrote document");
    }

    info!(count = documents.len(), "saved documents");
    Ok(documents.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::document::DocumentMetadata;

    fn doc(id: &str) -> Document {
        Document::new(
            DocumentMetadata::new(id, format!("https://example.com/{id}"), "Title"),
            format!("content of {id}"),
        )
    }

    #[test]
    fn test_write_then_read_flat() {
        let temp = TempDir::new().unwrap();
        let written =
            write_documents(temp.path(), &[doc("a"), doc("b")], WriteOptions::default()).unwrap();
        assert_eq!(written, 2);

        let loaded = read_documents(temp.path(), 0).unwrap();
        let ids: Vec<_> = loaded.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_read_nested_level_one_skips_root_files() {
        let temp = TempDir::new().unwrap();
        write_documents(temp.path(), &[doc("root")], WriteOptions::default()).unwrap();
        write_documents(&temp.path().join("db1"), &[doc("x")], WriteOptions::default()).unwrap();
        write_documents(&temp.path().join("db2"), &[doc("y")], WriteOptions::default()).unwrap();

        let loaded = read_documents(temp.path(), 1).unwrap();
        let ids: Vec<_> = loaded.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["x", "y"]);
    }

    #[test]
    fn test_read_missing_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let result = read_documents(&temp.path().join("missing"), 0);
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_read_malformed_json_reports_path() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.json"), "{ not json").unwrap();
        let err = read_documents(temp.path(), 0).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_write_text_copy_and_anonymise() {
        let temp = TempDir::new().unwrap();
        let options = WriteOptions {
            anonymise: true,
            text_copy: true,
        };
        write_documents(temp.path(), &[doc("abcdef")], options).unwrap();

        let loaded = read_documents(temp.path(), 0).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_ne!(loaded[0].id, "abcdef");
        assert_eq!(loaded[0].id.len(), 6);
        let text = fs::read_to_string(temp.path().join(format!("{}.txt", loaded[0].id))).unwrap();
        assert_eq!(text, "content of abcdef");
    }
}
