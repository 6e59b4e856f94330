//! Delegated text capabilities: classification, markup repair, restructuring
//! and title generation.
//!
//! The stages never talk to an LLM directly. They call [`TextCapability`],
//! which makes the fallback contract explicit: every call may fail, and every
//! caller has a deterministic substitute ready. [`LlmCapability`] is the
//! production implementation over an `edgequake-llm` provider;
//! [`OfflineCapability`] always fails and turns the whole pipeline into its
//! deterministic rules only.
//!
//! ## One attempt per call
//!
//! Unlike page transcription, every capability here has a cheap local
//! substitute, so a failed call is not retried: the stage falls back and the
//! run moves on. Each call is bounded by `api_timeout_secs`.

use crate::config::ProcessingConfig;
use crate::error::CapabilityError;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A single delegated request. Previews are already truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityTask<'a> {
    Classify { preview: &'a str, extension: &'a str },
    FixMarkup { preview: &'a str },
    FixMarkdown { preview: &'a str },
    Restructure { preview: &'a str },
    GenerateTitle { file_name: &'a str, preview: &'a str },
}

impl<'a> CapabilityTask<'a> {
    /// Stage name used in logs and [`crate::output::StageFallback`].
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityTask::Classify { .. } => "classify",
            CapabilityTask::FixMarkup { .. } => "fix_markup",
            CapabilityTask::FixMarkdown { .. } => "fix_markdown",
            CapabilityTask::Restructure { .. } => "restructure",
            CapabilityTask::GenerateTitle { .. } => "generate_title",
        }
    }

    pub fn preview(&self) -> &'a str {
        match *self {
            CapabilityTask::Classify { preview, .. }
            | CapabilityTask::FixMarkup { preview }
            | CapabilityTask::FixMarkdown { preview }
            | CapabilityTask::Restructure { preview }
            | CapabilityTask::GenerateTitle { preview, .. } => preview,
        }
    }

    /// Render the user prompt for this task.
    pub fn prompt(&self) -> String {
        match *self {
            CapabilityTask::Classify { preview, extension } => {
                prompts::classify_prompt(preview, extension)
            }
            CapabilityTask::FixMarkup { preview } => prompts::fix_markup_prompt(preview),
            CapabilityTask::FixMarkdown { preview } => prompts::fix_markdown_prompt(preview),
            CapabilityTask::Restructure { preview } => prompts::restructure_prompt(preview),
            CapabilityTask::GenerateTitle { file_name, preview } => {
                prompts::title_prompt(file_name, preview)
            }
        }
    }
}

/// The rewrite tasks that replace a content prefix with the service's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteTask {
    FixMarkup,
    FixMarkdown,
    Restructure,
}

impl RewriteTask {
    pub fn with_preview(self, preview: &str) -> CapabilityTask<'_> {
        match self {
            RewriteTask::FixMarkup => CapabilityTask::FixMarkup { preview },
            RewriteTask::FixMarkdown => CapabilityTask::FixMarkdown { preview },
            RewriteTask::Restructure => CapabilityTask::Restructure { preview },
        }
    }
}

/// An opaque, fallible text service.
#[async_trait]
pub trait TextCapability: Send + Sync {
    async fn invoke(&self, task: CapabilityTask<'_>) -> Result<String, CapabilityError>;
}

/// Capability backed by an `edgequake-llm` chat provider.
pub struct LlmCapability {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl LlmCapability {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ProcessingConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextCapability for LlmCapability {
    async fn invoke(&self, task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(task.prompt()),
        ];
        let options = self.options();

        let call = self.provider.chat(&messages, Some(&options));
        let response = match timeout(Duration::from_secs(self.timeout_secs), call).await {
            Err(_) => {
                return Err(CapabilityError::Timeout {
                    secs: self.timeout_secs,
                })
            }
            Ok(Err(e)) => return Err(CapabilityError::Failed(e.to_string())),
            Ok(Ok(response)) => response,
        };

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            task.name(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let content = response.content.trim();
        if content.is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}

/// Capability that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCapability;

#[async_trait]
impl TextCapability for OfflineCapability {
    async fn invoke(&self, _task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
        Err(CapabilityError::Unavailable("offline mode".to_string()))
    }
}

/// Resolve the text capability once per run, most specific first.
///
/// 1. Pre-built capability (`config.capability`), e.g. a test fake.
/// 2. Offline mode (`config.offline`).
/// 3. Pre-built provider (`config.provider`).
/// 4. Named provider + model (`config.provider_name`).
/// 5. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set.
/// 6. `ProviderFactory::from_env` auto-detection.
///
/// A provider that cannot be built is not fatal: every capability has a
/// fallback, so the run continues offline with a warning.
pub fn resolve_capability(config: &ProcessingConfig) -> Arc<dyn TextCapability> {
    if let Some(ref capability) = config.capability {
        return Arc::clone(capability);
    }
    if config.offline {
        info!("LLM disabled: every stage uses its deterministic fallback");
        return Arc::new(OfflineCapability);
    }

    match resolve_provider(config) {
        Ok(provider) => Arc::new(LlmCapability::new(provider, config)),
        Err(hint) => {
            warn!("No LLM provider available, continuing offline: {}", hint);
            Arc::new(OfflineCapability)
        }
    }
}

fn resolve_provider(config: &ProcessingConfig) -> Result<Arc<dyn LLMProvider>, String> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return ProviderFactory::create_llm_provider(name, model)
            .map_err(|e| format!("provider '{name}': {e}"));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return ProviderFactory::create_llm_provider(&prov, &model)
                .map_err(|e| format!("provider '{prov}': {e}"));
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        format!(
            "no provider could be auto-detected; set OPENAI_API_KEY, ANTHROPIC_API_KEY \
             or pass --provider ({e})"
        )
    })?;
    Ok(llm_provider)
}

// ── Preview helpers ──────────────────────────────────────────────────────

/// The first `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split `text` into a preview of at most `max_chars` characters and the rest.
///
/// The cut prefers the last line break, then the last space, inside the
/// bound so the remainder can be re-attached without gluing words.
pub fn split_preview(text: &str, max_chars: usize) -> (&str, &str) {
    let head = preview(text, max_chars);
    if head.len() == text.len() {
        return (text, "");
    }
    let cut = head
        .rfind('\n')
        .or_else(|| head.rfind(' '))
        .filter(|&i| i > 0)
        .unwrap_or(head.len());
    text.split_at(cut)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_+-]*\n(.*)\n```\s*$").unwrap());

/// Remove a code fence wrapping the entire answer (models add them anyway).
pub fn strip_outer_fence(answer: &str) -> String {
    match RE_OUTER_FENCE.captures(answer.trim()) {
        Some(caps) => caps[1].to_string(),
        None => answer.to_string(),
    }
}

/// Run a rewrite task over the bounded preview of `content`.
///
/// The answer replaces the previewed prefix; the remainder is appended
/// unchanged. An empty answer counts as a failure.
pub async fn rewrite(
    capability: &dyn TextCapability,
    task: RewriteTask,
    content: &str,
    max_chars: usize,
) -> Result<String, CapabilityError> {
    let (head, tail) = split_preview(content, max_chars);
    let answer = capability.invoke(task.with_preview(head)).await?;
    let answer = strip_outer_fence(&answer);
    if answer.trim().is_empty() {
        return Err(CapabilityError::EmptyResponse);
    }
    Ok(format!("{answer}{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TextCapability for Echo {
        async fn invoke(&self, task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
            Ok(task.preview().to_string())
        }
    }

    struct Fenced;

    #[async_trait]
    impl TextCapability for Fenced {
        async fn invoke(&self, _task: CapabilityTask<'_>) -> Result<String, CapabilityError> {
            Ok("```html\n<p>fixed</p>\n```".to_string())
        }
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("", 3), "");
    }

    #[test]
    fn split_prefers_line_breaks() {
        let (head, tail) = split_preview("line one\nline two\nline three", 15);
        assert_eq!(head, "line one");
        assert_eq!(tail, "\nline two\nline three");
    }

    #[test]
    fn split_short_text_has_empty_tail() {
        assert_eq!(split_preview("short", 100), ("short", ""));
    }

    #[test]
    fn strip_outer_fence_variants() {
        assert_eq!(strip_outer_fence("```markdown\n# T\n```"), "# T");
        assert_eq!(strip_outer_fence("```\nplain\n```\n"), "plain");
        assert_eq!(strip_outer_fence("no fence"), "no fence");
    }

    #[tokio::test]
    async fn echo_rewrite_is_identity_for_long_content() {
        let content = "word ".repeat(1000);
        let out = rewrite(&Echo, RewriteTask::FixMarkdown, &content, 100)
            .await
            .unwrap();
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn fenced_answer_is_unwrapped() {
        let out = rewrite(&Fenced, RewriteTask::FixMarkup, "<p>broken", 1500)
            .await
            .unwrap();
        assert_eq!(out, "<p>fixed</p>");
    }

    #[tokio::test]
    async fn offline_capability_always_fails() {
        let err = OfflineCapability
            .invoke(CapabilityTask::FixMarkup { preview: "<p/>" })
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }

    #[test]
    fn explicit_capability_wins() {
        let config = ProcessingConfig::builder()
            .capability(Arc::new(Echo))
            .offline(true)
            .build()
            .unwrap();
        let cap = resolve_capability(&config);
        let out = tokio_test::block_on(cap.invoke(CapabilityTask::FixMarkup { preview: "x" }));
        assert_eq!(out.unwrap(), "x");
    }

    #[test]
    fn task_names_are_stable() {
        assert_eq!(CapabilityTask::FixMarkup { preview: "" }.name(), "fix_markup");
        assert_eq!(
            CapabilityTask::GenerateTitle { file_name: "a.md", preview: "" }.name(),
            "generate_title"
        );
        assert_eq!(RewriteTask::Restructure.with_preview("p").name(), "restructure");
    }
}
