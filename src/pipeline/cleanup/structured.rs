//! Structured-document (DOCX) cleanup: extract, then restructure.
//!
//! Text members of an archive resolved as a structured document skip
//! extraction and are restructured as they are.

use super::CleanupContext;
use crate::kind::ContentKind;
use crate::output::ProcessableFile;
use crate::pipeline::capability::{rewrite, RewriteTask};
use tracing::debug;

pub async fn clean(ctx: CleanupContext<'_>, mut file: ProcessableFile) -> ProcessableFile {
    if ContentKind::StructuredDoc.matches_path(&file.path) {
        match ctx.extractor.extract(&file.original) {
            Ok(text) => {
                debug!("{}: extracted {} chars", file.path, text.len());
                file.cleaned = text;
            }
            // `cleaned` already holds the lossy payload
            Err(e) => ctx.fallback(&mut file, "extract", &e),
        }
    } else {
        debug!("{}: text entry, no extraction", file.path);
    }

    match rewrite(
        ctx.capability,
        RewriteTask::Restructure,
        &file.cleaned,
        ctx.config.fix_preview_chars,
    )
    .await
    {
        Ok(structured) => file.cleaned = structured,
        Err(e) => ctx.fallback(&mut file, "restructure", &e),
    }
    file
}

#[cfg(test)]
mod tests {
    use super::super::testing::{ctx, offline, Echo};
    use super::*;
    use crate::error::CapabilityError;
    use crate::pipeline::capability::{CapabilityTask, TextCapability};
    use crate::pipeline::extract::tests::docx_with_body;
    use async_trait::async_trait;

    struct Outline;

    #[async_trait]
    impl TextCapability for Outline {
        async fn invoke(&self, task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
            Ok(format!("<section>{}</section>", task.preview()))
        }
    }

    const BODY: &str = r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Report</w:t></w:r></w:p><w:p><w:r><w:t>Findings.</w:t></w:r></w:p>"#;

    #[tokio::test]
    async fn extracts_then_restructures() {
        let file = ProcessableFile::new("report.docx", docx_with_body(BODY));
        let out = clean(ctx(&Outline), file).await;
        assert_eq!(out.cleaned, "<section><h1>Report</h1>\n<p>Findings.</p></section>");
        assert!(out.fallbacks.is_empty());
    }

    #[tokio::test]
    async fn echo_restructure_keeps_extracted_text() {
        let file = ProcessableFile::new("report.docx", docx_with_body(BODY));
        let out = clean(ctx(&Echo { title: "" }), file).await;
        assert_eq!(out.cleaned, "<h1>Report</h1>\n<p>Findings.</p>");
    }

    #[tokio::test]
    async fn text_entry_is_restructured_without_extraction() {
        let file = ProcessableFile::new("guide.md", b"# Guide\n\nSteps.".to_vec());
        let out = clean(ctx(&Outline), file).await;
        assert_eq!(out.cleaned, "<section># Guide\n\nSteps.</section>");
        assert!(out.fallbacks.is_empty());
    }

    #[tokio::test]
    async fn unreadable_document_falls_back_to_raw_text() {
        let file = ProcessableFile::new("broken.docx", b"just some text".to_vec());
        let out = clean(offline(), file).await;
        assert_eq!(out.cleaned, "just some text");
        let stages: Vec<&str> = out.fallbacks.iter().map(|f| f.stage.as_str()).collect();
        assert_eq!(stages, vec!["extract", "restructure"]);
    }
}
