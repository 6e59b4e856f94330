//! Error types for the edgequake-zip2dita library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Zip2DitaError`] (**fatal**): the submission cannot proceed at all
//!   (unreadable archive, nothing to sample, unsupported upload, a mandatory
//!   conversion endpoint that is missing or down). The `process_*` entry points
//!   fold it into a `Failed` [`crate::output::ConversionOutcome`]; the
//!   `prepare_*` / `analyze_*` entry points return it as `Err`.
//!
//! * [`CapabilityError`] (**non-fatal**): a delegated LLM or extraction call
//!   failed. Every stage that calls a capability has a local fallback, so this
//!   error never escapes a cleanup strategy; it is recorded in
//!   [`crate::output::StageFallback`] for later inspection.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-zip2dita library.
#[derive(Debug, Error)]
pub enum Zip2DitaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The upload's extension is neither an archive nor a structured document.
    #[error("Unsupported file type '{extension}' for '{name}'\nExpected a .zip archive or a .docx document.")]
    UnsupportedFileType { name: String, extension: String },

    // ── Archive errors ────────────────────────────────────────────────────
    /// The container could not be parsed or an entry could not be inflated.
    #[error("Archive '{name}' is corrupt: {detail}")]
    CorruptArchive { name: String, detail: String },

    /// The archive holds no HTML or Markdown member to sample.
    #[error("No HTML or Markdown files found in '{name}' ({entries} entries scanned)")]
    NoEligibleContent { name: String, entries: usize },

    /// Writing the repackaged archive failed.
    #[error("Failed to write repackaged archive entry '{path}': {detail}")]
    ArchiveWriteFailed { path: String, detail: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// A mandatory conversion endpoint has no configured address.
    #[error("No conversion endpoint configured for '{kind}' documents.\nSet {env_var} or pass the matching --*-endpoint flag.")]
    EndpointNotConfigured { kind: String, env_var: String },

    /// The conversion endpoint was reachable-in-principle but the call failed.
    #[error("Conversion via '{endpoint}' failed: {detail}")]
    ConversionFailed { endpoint: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of a delegated capability call.
///
/// Stored alongside [`crate::output::StageFallback`] when a stage degrades to
/// its deterministic substitute.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum CapabilityError {
    /// No backing service is available (offline mode, no provider configured).
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded its per-call budget.
    #[error("capability call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backing service returned an error.
    #[error("capability call failed: {0}")]
    Failed(String),

    /// The service answered with nothing usable.
    #[error("capability returned an empty response")]
    EmptyResponse,

    /// The service answered but the payload could not be interpreted.
    #[error("capability response malformed: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_file_type_display() {
        let e = Zip2DitaError::UnsupportedFileType {
            name: "notes.txt".into(),
            extension: "txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains(".zip"), "got: {msg}");
    }

    #[test]
    fn endpoint_not_configured_mentions_configuration() {
        let e = Zip2DitaError::EndpointNotConfigured {
            kind: "docx".into(),
            env_var: "DOCX_TO_DITA_API".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("No conversion endpoint configured"));
        assert!(msg.contains("DOCX_TO_DITA_API"));
    }

    #[test]
    fn no_eligible_content_display() {
        let e = Zip2DitaError::NoEligibleContent {
            name: "assets.zip".into(),
            entries: 7,
        };
        assert!(e.to_string().contains("7 entries"));
    }

    #[test]
    fn capability_timeout_display() {
        let e = CapabilityError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn capability_error_serialises() {
        let e = CapabilityError::Failed("HTTP 503".into());
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("HTTP 503"));
    }
}
