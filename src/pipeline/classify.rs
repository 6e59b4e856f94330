//! Content-type classification of a single entry.
//!
//! [`classify`] never fails: any capability error, unparsable reply or kind
//! outside the closed set degrades to [`fallback_kind`] on the declared
//! extension.

use crate::config::ProcessingConfig;
use crate::kind::{ClassificationResult, ClassificationSource, ContentKind};
use crate::pipeline::capability::{preview, strip_outer_fence, CapabilityTask, TextCapability};
use serde::Deserialize;
use tracing::{debug, warn};

/// Deterministic kind for a declared extension (with or without the dot).
///
/// Unknown extensions map to HTML: it is the most permissive cleanup.
pub fn fallback_kind(extension: &str) -> ContentKind {
    match extension
        .trim_start_matches('.')
        .to_ascii_lowercase()
        .as_str()
    {
        "md" => ContentKind::Markdown,
        "docx" => ContentKind::StructuredDoc,
        _ => ContentKind::Html,
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(alias = "type")]
    kind: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Classify one entry's text.
pub async fn classify(
    capability: &dyn TextCapability,
    text: &str,
    extension: &str,
    config: &ProcessingConfig,
) -> ClassificationResult {
    let task = CapabilityTask::Classify {
        preview: preview(text, config.classify_preview_chars),
        extension,
    };

    let reply = match capability.invoke(task).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Classification unavailable for .{}, using extension: {}", extension, e);
            return ClassificationResult::fallback(fallback_kind(extension));
        }
    };

    match parse_reply(&reply) {
        Some(result) => {
            debug!(
                "Classified .{} as {} (confidence {:.2})",
                extension, result.kind, result.confidence
            );
            result
        }
        None => {
            warn!(
                "Unusable classification reply for .{}, using extension",
                extension
            );
            ClassificationResult::fallback(fallback_kind(extension))
        }
    }
}

/// Parse a classifier reply. `None` when it is not JSON or names no known kind.
fn parse_reply(reply: &str) -> Option<ClassificationResult> {
    let body = strip_outer_fence(reply);
    let json = extract_json_object(&body)?;
    let raw: RawClassification = serde_json::from_str(json).ok()?;
    let kind = ContentKind::parse(&raw.kind)?;
    let confidence = raw
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Some(ClassificationResult {
        kind,
        confidence,
        issues: raw.issues,
        recommendations: raw.recommendations,
        source: ClassificationSource::Capability,
    })
}

/// Outermost `{ … }` span; models sometimes wrap the JSON in prose.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilityError;
    use crate::pipeline::capability::OfflineCapability;
    use async_trait::async_trait;

    struct Reply(&'static str);

    #[async_trait]
    impl TextCapability for Reply {
        async fn invoke(&self, _task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
            Ok(self.0.to_string())
        }
    }

    fn config() -> ProcessingConfig {
        ProcessingConfig::default()
    }

    #[test]
    fn fallback_kind_is_total() {
        assert_eq!(fallback_kind(".md"), ContentKind::Markdown);
        assert_eq!(fallback_kind("MD"), ContentKind::Markdown);
        assert_eq!(fallback_kind("html"), ContentKind::Html);
        assert_eq!(fallback_kind(".htm"), ContentKind::Html);
        assert_eq!(fallback_kind(".docx"), ContentKind::StructuredDoc);
        assert_eq!(fallback_kind(".txt"), ContentKind::Html);
        assert_eq!(fallback_kind(""), ContentKind::Html);
    }

    #[tokio::test]
    async fn valid_reply_is_used() {
        let cap = Reply(
            r#"{"kind":"markdown","confidence":0.9,"issues":["trailing spaces"],"recommendations":[]}"#,
        );
        let r = classify(&cap, "# Title", "html", &config()).await;
        assert_eq!(r.kind, ContentKind::Markdown);
        assert_eq!(r.source, ClassificationSource::Capability);
        assert_eq!(r.issues, vec!["trailing spaces".to_string()]);
    }

    #[tokio::test]
    async fn type_alias_fence_and_clamping() {
        let cap = Reply("```json\n{\"type\": \"HTML\", \"confidence\": 7}\n```");
        let r = classify(&cap, "<p>x</p>", "md", &config()).await;
        assert_eq!(r.kind, ContentKind::Html);
        assert_eq!(r.confidence, 1.0);
    }

    #[tokio::test]
    async fn out_of_set_kind_falls_back_to_extension() {
        let cap = Reply(r#"{"kind":"pdf","confidence":0.8}"#);
        let r = classify(&cap, "whatever", "md", &config()).await;
        assert_eq!(r.kind, ContentKind::Markdown);
        assert_eq!(r.source, ClassificationSource::ExtensionFallback);
        assert_eq!(r.confidence, 0.0);
    }

    #[tokio::test]
    async fn prose_reply_falls_back() {
        let r = classify(&Reply("It looks like HTML to me."), "x", "htm", &config()).await;
        assert_eq!(r.kind, ContentKind::Html);
        assert_eq!(r.source, ClassificationSource::ExtensionFallback);
    }

    #[tokio::test]
    async fn offline_uses_extension() {
        let r = classify(&OfflineCapability, "# A", "md", &config()).await;
        assert_eq!(r, ClassificationResult::fallback(ContentKind::Markdown));
    }
}
