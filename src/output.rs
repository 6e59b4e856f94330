//! Records produced by the pipeline.
//!
//! [`ConversionOutcome`] is the terminal record: exactly one per submission,
//! success or failure. The other types are intermediate results that library
//! callers can inspect when they drive the stages themselves
//! ([`crate::process::prepare_file`] → [`crate::process::dispatch_bundle`]).

use crate::error::Zip2DitaError;
use crate::kind::{ClassificationResult, ContentKind};
use crate::pipeline::resolve::DominantTypeVote;
use serde::{Deserialize, Serialize};

/// A stage that degraded to its deterministic substitute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFallback {
    /// Stage name, e.g. `fix_markup`, `generate_title`, `extract`.
    pub stage: String,
    /// Why the capability result was not used.
    pub reason: String,
}

/// An archive member that went through a cleanup strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessableFile {
    /// Stored path, unchanged from the source archive.
    pub path: String,
    /// Raw payload as read from the source. Never modified.
    #[serde(skip)]
    pub original: Vec<u8>,
    /// Output of the last stage that ran.
    pub cleaned: String,
    /// Stages that fell back, in pipeline order.
    pub fallbacks: Vec<StageFallback>,
}

impl ProcessableFile {
    pub(crate) fn new(path: impl Into<String>, original: Vec<u8>) -> Self {
        let cleaned = String::from_utf8_lossy(&original).into_owned();
        Self {
            path: path.into(),
            original,
            cleaned,
            fallbacks: Vec::new(),
        }
    }

    /// Lossy text view of the original payload.
    pub fn original_text(&self) -> String {
        String::from_utf8_lossy(&self.original).into_owned()
    }
}

/// A cleaned bundle ready for dispatch.
#[derive(Debug, Clone)]
pub struct PreparedBundle {
    /// Submission identifier forwarded to the conversion service.
    pub request_id: String,
    /// File name of the upload.
    pub source_name: String,
    /// Kind governing cleanup and endpoint selection.
    pub kind: ContentKind,
    /// The repackaged archive.
    pub archive: Vec<u8>,
    /// Cleaned entries, in enumeration order.
    pub processed: Vec<ProcessableFile>,
    pub asset_count: usize,
    /// Directory pseudo-entries that were dropped.
    pub excluded_count: usize,
    /// Entries classified while resolving the kind (0 for single documents).
    pub sampled: usize,
}

impl PreparedBundle {
    /// Total stage fallbacks across all processed entries.
    pub fn fallback_count(&self) -> usize {
        self.processed.iter().map(|f| f.fallbacks.len()).sum()
    }
}

/// Terminal status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// The one record returned per submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub request_id: String,
    pub source_name: String,
    /// Absent only when the run failed before a kind was resolved.
    pub kind: Option<ContentKind>,
    pub processed_count: usize,
    pub asset_count: usize,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the conversion service was bypassed with a mock answer.
    pub mock: bool,
    pub duration_ms: u64,
}

impl ConversionOutcome {
    /// Build a failed outcome from a fatal error.
    pub fn failed(
        request_id: impl Into<String>,
        source_name: impl Into<String>,
        kind: Option<ContentKind>,
        counts: (usize, usize),
        error: &Zip2DitaError,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            source_name: source_name.into(),
            kind,
            processed_count: counts.0,
            asset_count: counts.1,
            status: OutcomeStatus::Failed,
            download_link: None,
            message: None,
            error: Some(error.to_string()),
            mock: false,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// One classified sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledEntry {
    pub path: String,
    pub classification: ClassificationResult,
}

/// Result of analysis-only mode: sampling and voting, no cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveAnalysis {
    pub source_name: String,
    pub total_entries: usize,
    pub directories: usize,
    /// Entries whose extension made them eligible for sampling.
    pub candidates: usize,
    pub sampled: Vec<SampledEntry>,
    pub votes: DominantTypeVote,
    pub dominant: ContentKind,
}

/// Reachability of one conversion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub kind: ContentKind,
    pub endpoint: Option<String>,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_carries_error_text() {
        let err = Zip2DitaError::CorruptArchive {
            name: "x.zip".into(),
            detail: "invalid Zip archive".into(),
        };
        let o = ConversionOutcome::failed("req-1", "x.zip", None, (0, 0), &err);
        assert_eq!(o.status, OutcomeStatus::Failed);
        assert!(o.error.as_deref().unwrap().contains("corrupt"));
        assert!(!o.is_success());
    }

    #[test]
    fn outcome_json_omits_empty_optionals() {
        let err = Zip2DitaError::Internal("boom".into());
        let o = ConversionOutcome::failed("req-2", "y.zip", Some(ContentKind::Html), (1, 2), &err);
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"kind\":\"html\""));
        assert!(!json.contains("download_link"));
    }

    #[test]
    fn processable_file_starts_from_original_text() {
        let f = ProcessableFile::new("a.md", b"# Hi".to_vec());
        assert_eq!(f.cleaned, "# Hi");
        assert_eq!(f.original_text(), "# Hi");
        assert!(f.fallbacks.is_empty());
    }
}
