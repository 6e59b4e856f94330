//! Archive reading and writing.
//!
//! Entries are read eagerly: uploads are bounded by the front end and every
//! later stage (sampling, partitioning, rewriting) walks the full entry list
//! at least once. Paths are kept exactly as stored, nested directories
//! included, so the rewritten archive can reproduce them verbatim.

use crate::error::Zip2DitaError;
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One member of a source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full relative path as stored, e.g. `docs/guide/intro.md`.
    pub path: String,
    /// Directory pseudo-entry (`docs/`). Never classified or cleaned.
    pub is_dir: bool,
    bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            bytes,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            bytes: Vec::new(),
        }
    }

    /// Payload decoded as UTF-8; invalid sequences become U+FFFD.
    pub fn read_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Raw payload.
    pub fn read_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }
}

/// Last path segment of a stored path.
pub fn file_name_of(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Open a zip container and read every entry in enumeration order.
///
/// `name` is only used in error messages.
pub fn open_archive(name: &str, bytes: &[u8]) -> Result<Vec<ArchiveEntry>, Zip2DitaError> {
    let corrupt = |detail: String| Zip2DitaError::CorruptArchive {
        name: name.to_string(),
        detail,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(e.to_string()))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| corrupt(format!("entry #{i}: {e}")))?;
        let path = file.name().to_string();

        if file.is_dir() {
            entries.push(ArchiveEntry::directory(path));
            continue;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| corrupt(format!("entry '{path}': {e}")))?;
        entries.push(ArchiveEntry::new(path, data));
    }

    debug!("Opened '{}': {} entries", name, entries.len());
    Ok(entries)
}

/// Write `files` into a new deflated zip, in the given order.
///
/// A repeated path is rejected rather than silently shadowed.
pub fn write_archive<'a, I>(files: I) -> Result<Vec<u8>, Zip2DitaError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (path, bytes) in files {
        let failed = |detail: String| Zip2DitaError::ArchiveWriteFailed {
            path: path.to_string(),
            detail,
        };
        writer
            .start_file(path, entry_options())
            .map_err(|e| failed(e.to_string()))?;
        writer.write_all(bytes).map_err(|e| failed(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| Zip2DitaError::ArchiveWriteFailed {
            path: "<central directory>".to_string(),
            detail: e.to_string(),
        })?;
    Ok(cursor.into_inner())
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}
