//! Per-kind cleanup strategies.
//!
//! Every strategy is a fixed sequence of deterministic rules followed by one
//! delegated pass. Each stage is total: a failed capability call leaves the
//! previous stage's output in place and appends a
//! [`StageFallback`](crate::output::StageFallback) to the file.
//!
//! Strategy selection is a plain `match` on [`ContentKind`]; adding a kind
//! means adding a variant and a module here.

pub mod html;
pub mod markdown;
pub mod structured;

use crate::config::ProcessingConfig;
use crate::error::CapabilityError;
use crate::kind::ContentKind;
use crate::output::{ProcessableFile, StageFallback};
use crate::pipeline::capability::TextCapability;
use crate::pipeline::extract::DocumentExtractor;
use crate::progress::ProcessingProgressCallback;
use tracing::warn;

/// Shared, per-run services handed to every strategy.
#[derive(Clone, Copy)]
pub struct CleanupContext<'a> {
    pub capability: &'a dyn TextCapability,
    pub extractor: &'a dyn DocumentExtractor,
    pub config: &'a ProcessingConfig,
    pub progress: &'a dyn ProcessingProgressCallback,
}

impl CleanupContext<'_> {
    /// Record that `stage` fell back for `file`.
    pub(crate) fn fallback(&self, file: &mut ProcessableFile, stage: &str, err: &CapabilityError) {
        warn!("{}: {} fell back: {}", file.path, stage, err);
        let reason = err.to_string();
        self.progress.on_entry_fallback(&file.path, stage, &reason);
        file.fallbacks.push(StageFallback {
            stage: stage.to_string(),
            reason,
        });
    }
}

/// The cleanup applied to processable entries of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStrategy {
    Html,
    Markdown,
    StructuredDoc,
}

impl CleanupStrategy {
    pub fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Html => CleanupStrategy::Html,
            ContentKind::Markdown => CleanupStrategy::Markdown,
            ContentKind::StructuredDoc => CleanupStrategy::StructuredDoc,
        }
    }

    /// Clean one entry. Never fails.
    pub async fn clean(
        self,
        ctx: CleanupContext<'_>,
        path: &str,
        original: Vec<u8>,
    ) -> ProcessableFile {
        let file = ProcessableFile::new(path, original);
        match self {
            CleanupStrategy::Html => html::clean(ctx, file).await,
            CleanupStrategy::Markdown => markdown::clean(ctx, file).await,
            CleanupStrategy::StructuredDoc => structured::clean(ctx, file).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the strategy tests.

    use super::*;
    use crate::pipeline::capability::{CapabilityTask, OfflineCapability};
    use crate::pipeline::extract::DocxExtractor;
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use once_cell::sync::Lazy;

    /// Returns every preview unchanged; answers title requests with `title`.
    pub struct Echo {
        pub title: &'static str,
    }

    #[async_trait]
    impl TextCapability for Echo {
        async fn invoke(&self, task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
            match task {
                CapabilityTask::GenerateTitle { .. } => Ok(self.title.to_string()),
                other => Ok(other.preview().to_string()),
            }
        }
    }

    pub static CONFIG: Lazy<ProcessingConfig> = Lazy::new(ProcessingConfig::default);

    pub fn ctx(capability: &dyn TextCapability) -> CleanupContext<'_> {
        CleanupContext {
            capability,
            extractor: &DocxExtractor,
            config: &CONFIG,
            progress: &NoopProgressCallback,
        }
    }

    pub fn offline() -> CleanupContext<'static> {
        ctx(&OfflineCapability)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn strategy_follows_kind() {
        assert_eq!(CleanupStrategy::for_kind(ContentKind::Html), CleanupStrategy::Html);
        assert_eq!(
            CleanupStrategy::for_kind(ContentKind::StructuredDoc),
            CleanupStrategy::StructuredDoc
        );
    }

    #[tokio::test]
    async fn offline_records_fallback_and_keeps_deterministic_output() {
        let file = CleanupStrategy::Html
            .clean(offline(), "a.html", b"<p class=\"x\">Hi</p>".to_vec())
            .await;
        assert_eq!(file.cleaned, "<p>Hi</p>");
        assert_eq!(file.fallbacks.len(), 1);
        assert_eq!(file.fallbacks[0].stage, "fix_markup");
        assert_eq!(file.original, b"<p class=\"x\">Hi</p>");
    }
}
