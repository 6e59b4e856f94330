//! The closed set of document kinds a submission can resolve to.
//!
//! Every kind owns a fixed *extension family*. The family decides which
//! archive members are processable once a kind has been chosen for the whole
//! archive, and which conversion endpoint receives the bundle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Extensions that carry text and therefore take part in sampling.
pub const CANDIDATE_EXTENSIONS: &[&str] = &["html", "htm", "md"];

/// Extension of archive uploads.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Extension of structured (word-processor) documents.
pub const STRUCTURED_DOC_EXTENSION: &str = "docx";

/// Document kind governing cleanup and conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Markdown,
    #[serde(rename = "docx")]
    StructuredDoc,
}

impl ContentKind {
    /// All kinds, in declaration order.
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Html,
        ContentKind::Markdown,
        ContentKind::StructuredDoc,
    ];

    /// Stable lowercase name used on the wire and in mock links.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Markdown => "markdown",
            ContentKind::StructuredDoc => "docx",
        }
    }

    /// Human label for log lines and mock messages.
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Html => "HTML",
            ContentKind::Markdown => "Markdown",
            ContentKind::StructuredDoc => "DOCX",
        }
    }

    /// Lowercase extensions (without dot) belonging to this kind.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ContentKind::Html => &["html", "htm"],
            ContentKind::Markdown => &["md"],
            ContentKind::StructuredDoc => &[STRUCTURED_DOC_EXTENSION],
        }
    }

    /// Whether `path` belongs to this kind's extension family.
    pub fn matches_path(self, path: &str) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }

    /// Parse a kind name returned by a classifier.
    ///
    /// Only the closed set is accepted; anything else is `None` so the caller
    /// can fall back.
    pub fn parse(name: &str) -> Option<ContentKind> {
        match name.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(ContentKind::Html),
            "markdown" | "md" => Some(ContentKind::Markdown),
            "docx" | "structured_doc" | "structured-doc" => Some(ContentKind::StructuredDoc),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of a stored path, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether `path` is eligible for dominant-type sampling.
pub fn is_candidate(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| CANDIDATE_EXTENSIONS.contains(&ext.as_str()))
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// The classification capability answered with a valid kind.
    Capability,
    /// The deterministic extension rules were used.
    ExtensionFallback,
}

/// Result of classifying one sampled entry.
///
/// Only `kind` takes part in the vote; the remaining fields are advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub kind: ContentKind,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: ClassificationSource,
}

impl ClassificationResult {
    /// A fallback result with no advisory data.
    pub fn fallback(kind: ContentKind) -> Self {
        Self {
            kind,
            confidence: 0.0,
            issues: Vec::new(),
            recommendations: Vec::new(),
            source: ClassificationSource::ExtensionFallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_closed_set() {
        assert_eq!(ContentKind::parse("HTML"), Some(ContentKind::Html));
        assert_eq!(ContentKind::parse(" markdown\n"), Some(ContentKind::Markdown));
        assert_eq!(ContentKind::parse("\"docx\""), Some(ContentKind::StructuredDoc));
        assert_eq!(ContentKind::parse("pdf"), None);
        assert_eq!(ContentKind::parse(""), None);
    }

    #[test]
    fn extension_families() {
        assert!(ContentKind::Html.matches_path("site/index.HTM"));
        assert!(ContentKind::Markdown.matches_path("docs/a/b.md"));
        assert!(!ContentKind::Markdown.matches_path("docs/a/b.html"));
        assert!(ContentKind::StructuredDoc.matches_path("report.docx"));
        assert!(!ContentKind::Html.matches_path("README"));
    }

    #[test]
    fn candidates_exclude_docx_and_assets() {
        assert!(is_candidate("a.md"));
        assert!(is_candidate("nested/dir/b.html"));
        assert!(!is_candidate("report.docx"));
        assert!(!is_candidate("img/logo.png"));
        assert!(!is_candidate("folder/"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ContentKind::StructuredDoc).unwrap();
        assert_eq!(json, "\"docx\"");
        let back: ContentKind = serde_json::from_str("\"markdown\"").unwrap();
        assert_eq!(back, ContentKind::Markdown);
    }
}
