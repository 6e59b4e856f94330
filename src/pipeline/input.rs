//! Ingress: turn an uploaded path or buffer into a routed [`Submission`].
//!
//! Routing is by extension only. Archives go through sampling and
//! repackaging; a standalone `.docx` skips the archive reader and is cleaned
//! as a single structured document.

use crate::error::Zip2DitaError;
use crate::kind::{extension_of, ARCHIVE_EXTENSION, STRUCTURED_DOC_EXTENSION};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a submission is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Archive,
    StructuredDocument,
}

/// An upload read into memory.
#[derive(Debug, Clone)]
pub struct Submission {
    /// File name (no directories), used in the bundle and in messages.
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: SubmissionKind,
}

impl Submission {
    /// Route an in-memory upload by its file name.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, Zip2DitaError> {
        let name = name.into();
        let kind = route(&name)?;
        Ok(Self { name, bytes, kind })
    }
}

/// Submission kind for a file name; any other extension is rejected.
pub fn route(name: &str) -> Result<SubmissionKind, Zip2DitaError> {
    match extension_of(name).as_deref() {
        Some(ARCHIVE_EXTENSION) => Ok(SubmissionKind::Archive),
        Some(STRUCTURED_DOC_EXTENSION) => Ok(SubmissionKind::StructuredDocument),
        other => Err(Zip2DitaError::UnsupportedFileType {
            name: name.to_string(),
            extension: other.unwrap_or("").to_string(),
        }),
    }
}

/// Read a local upload, validating existence, permissions and extension.
///
/// The extension is checked before reading so a wrong file type fails
/// without touching its contents.
pub async fn read_submission(path: &Path) -> Result<Submission, Zip2DitaError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    if !path.exists() {
        return Err(Zip2DitaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let kind = route(&name)?;

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Zip2DitaError::PermissionDenied {
            path: PathBuf::from(path),
        },
        std::io::ErrorKind::NotFound => Zip2DitaError::FileNotFound {
            path: PathBuf::from(path),
        },
        _ => Zip2DitaError::Internal(format!("reading {}: {e}", path.display())),
    })?;

    debug!("Read {} ({} bytes, {:?})", path.display(), bytes.len(), kind);
    Ok(Submission { name, bytes, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_extension() {
        assert_eq!(route("bundle.ZIP").unwrap(), SubmissionKind::Archive);
        assert_eq!(route("report.docx").unwrap(), SubmissionKind::StructuredDocument);
        match route("notes.txt").unwrap_err() {
            Zip2DitaError::UnsupportedFileType { extension, .. } => assert_eq!(extension, "txt"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(route("README").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = read_submission(Path::new("/definitely/not/here.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, Zip2DitaError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_existing_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, b"PK").unwrap();
        let sub = read_submission(&path).await.unwrap();
        assert_eq!(sub.name, "doc.docx");
        assert_eq!(sub.kind, SubmissionKind::StructuredDocument);
        assert_eq!(sub.bytes, b"PK");
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let err = read_submission(&path).await.unwrap_err();
        assert!(matches!(err, Zip2DitaError::UnsupportedFileType { .. }));
    }
}
