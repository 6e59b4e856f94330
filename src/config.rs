//! Configuration types for bundle preparation and conversion dispatch.
//!
//! All behaviour is controlled through [`ProcessingConfig`], built via its
//! [`ProcessingConfigBuilder`]. The config is constructed once per process and
//! passed by reference into every stage; no stage reads the environment.
//!
//! # Design choice: builder over constructor
//! Most callers only touch the endpoints and the provider. The builder lets
//! them set exactly that and rely on documented defaults for the sampling and
//! preview bounds.

use crate::error::Zip2DitaError;
use crate::kind::ContentKind;
use crate::pipeline::capability::TextCapability;
use crate::pipeline::extract::DocumentExtractor;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for processing a submission.
///
/// # Example
/// ```rust
/// use edgequake_zip2dita::{ContentKind, DispatchPolicy, ProcessingConfig};
///
/// let config = ProcessingConfig::builder()
///     .endpoint(ContentKind::Markdown, "http://localhost:8448/api/markdowntodita")
///     .policy(ContentKind::Markdown, DispatchPolicy::Mandatory)
///     .sample_size(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.sample_size, 5);
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text capability. Takes precedence over every provider
    /// setting; tests inject scripted fakes here.
    pub capability: Option<Arc<dyn TextCapability>>,

    /// Document extractor for structured documents. Default: DOCX extractor.
    pub extractor: Option<Arc<dyn DocumentExtractor>>,

    /// Skip provider resolution entirely; every capability stage takes its
    /// deterministic fallback. Default: false.
    pub offline: bool,

    /// Sampling temperature for every LLM call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Per-capability-call timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// How many candidate entries are classified to pick the dominant kind. Default: 5.
    pub sample_size: usize,

    /// Characters of an entry shown to the classifier. Default: 500.
    pub classify_preview_chars: usize,

    /// Characters sent to the fix / restructure capabilities. Default: 1500.
    ///
    /// Content beyond this bound is carried over untouched after the
    /// capability's answer.
    pub fix_preview_chars: usize,

    /// Characters of the body sent along with a title request. Default: 500.
    pub title_preview_chars: usize,

    /// Cleanups allowed in flight at once. Output order is unaffected. Default: 4.
    pub concurrency: usize,

    /// Per-kind conversion endpoints and their dispatch policies.
    pub endpoints: ConversionEndpoints,

    /// Timeout for one conversion upload in seconds. Default: 60.
    pub conversion_timeout_secs: u64,

    /// Prefix of the synthetic download link returned by mock conversions.
    pub mock_download_base: String,

    /// Receives pipeline events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            capability: None,
            extractor: None,
            offline: false,
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 30,
            sample_size: 5,
            classify_preview_chars: 500,
            fix_preview_chars: 1500,
            title_preview_chars: 500,
            concurrency: 4,
            endpoints: ConversionEndpoints::default(),
            conversion_timeout_secs: 60,
            mock_download_base: "https://mock-api.com/download".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("capability", &self.capability.as_ref().map(|_| "<dyn TextCapability>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn DocumentExtractor>"))
            .field("offline", &self.offline)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("sample_size", &self.sample_size)
            .field("classify_preview_chars", &self.classify_preview_chars)
            .field("fix_preview_chars", &self.fix_preview_chars)
            .field("title_preview_chars", &self.title_preview_chars)
            .field("concurrency", &self.concurrency)
            .field("endpoints", &self.endpoints)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessingConfig`].
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl fmt::Debug for ProcessingConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ProcessingConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn capability(mut self, capability: Arc<dyn TextCapability>) -> Self {
        self.config.capability = Some(capability);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn offline(mut self, v: bool) -> Self {
        self.config.offline = v;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.config.sample_size = n.max(1);
        self
    }

    pub fn classify_preview_chars(mut self, n: usize) -> Self {
        self.config.classify_preview_chars = n.max(1);
        self
    }

    pub fn fix_preview_chars(mut self, n: usize) -> Self {
        self.config.fix_preview_chars = n.max(1);
        self
    }

    pub fn title_preview_chars(mut self, n: usize) -> Self {
        self.config.title_preview_chars = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Set the conversion endpoint URL for one kind.
    pub fn endpoint(mut self, kind: ContentKind, url: impl Into<String>) -> Self {
        self.config.endpoints.for_kind_mut(kind).url = Some(url.into());
        self
    }

    /// Set the dispatch policy for one kind.
    pub fn policy(mut self, kind: ContentKind, policy: DispatchPolicy) -> Self {
        self.config.endpoints.for_kind_mut(kind).policy = policy;
        self
    }

    pub fn endpoints(mut self, endpoints: ConversionEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn mock_download_base(mut self, base: impl Into<String>) -> Self {
        self.config.mock_download_base = base.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, Zip2DitaError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 || c.conversion_timeout_secs == 0 {
            return Err(Zip2DitaError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.sample_size == 0 {
            return Err(Zip2DitaError::InvalidConfig(
                "Sample size must be ≥ 1".into(),
            ));
        }
        for kind in ContentKind::ALL {
            if let Some(url) = c.endpoints.for_kind(kind).url.as_deref() {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(Zip2DitaError::InvalidConfig(format!(
                        "Endpoint for {} must be an http(s) URL, got '{}'",
                        kind, url
                    )));
                }
            }
        }
        Ok(self.config)
    }
}

// ── Endpoints ────────────────────────────────────────────────────────────

/// What happens when a conversion endpoint is missing or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPolicy {
    /// Missing endpoints and transport failures degrade to a mock outcome.
    BestEffort,
    /// Missing endpoints and transport failures fail the submission.
    Mandatory,
}

/// One kind's conversion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: Option<String>,
    pub policy: DispatchPolicy,
}

/// Conversion endpoints for every kind.
///
/// HTML and Markdown default to best-effort and DOCX to mandatory, matching
/// how the upstream conversion services are deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionEndpoints {
    pub html: EndpointConfig,
    pub markdown: EndpointConfig,
    pub structured_doc: EndpointConfig,
}

impl Default for ConversionEndpoints {
    fn default() -> Self {
        Self {
            html: EndpointConfig {
                url: None,
                policy: DispatchPolicy::BestEffort,
            },
            markdown: EndpointConfig {
                url: None,
                policy: DispatchPolicy::BestEffort,
            },
            structured_doc: EndpointConfig {
                url: None,
                policy: DispatchPolicy::Mandatory,
            },
        }
    }
}

impl ConversionEndpoints {
    pub fn for_kind(&self, kind: ContentKind) -> &EndpointConfig {
        match kind {
            ContentKind::Html => &self.html,
            ContentKind::Markdown => &self.markdown,
            ContentKind::StructuredDoc => &self.structured_doc,
        }
    }

    pub fn for_kind_mut(&mut self, kind: ContentKind) -> &mut EndpointConfig {
        match kind {
            ContentKind::Html => &mut self.html,
            ContentKind::Markdown => &mut self.markdown,
            ContentKind::StructuredDoc => &mut self.structured_doc,
        }
    }

    /// Make every endpoint mandatory.
    pub fn strict(mut self) -> Self {
        for kind in ContentKind::ALL {
            self.for_kind_mut(kind).policy = DispatchPolicy::Mandatory;
        }
        self
    }
}

/// Environment variable conventionally holding a kind's endpoint URL.
///
/// Only used for error hints and by the CLI's `env` bindings.
pub fn endpoint_env_var(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Html => "HTML_TO_DITA_API",
        ContentKind::Markdown => "MARKDOWN_TO_DITA_API",
        ContentKind::StructuredDoc => "DOCX_TO_DITA_API",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_bounds() {
        let c = ProcessingConfig::default();
        assert_eq!(c.sample_size, 5);
        assert_eq!(c.classify_preview_chars, 500);
        assert_eq!(c.fix_preview_chars, 1500);
        assert_eq!(c.conversion_timeout_secs, 60);
        assert_eq!(c.endpoints.html.policy, DispatchPolicy::BestEffort);
        assert_eq!(c.endpoints.markdown.policy, DispatchPolicy::BestEffort);
        assert_eq!(c.endpoints.structured_doc.policy, DispatchPolicy::Mandatory);
    }

    #[test]
    fn builder_clamps_and_sets_endpoints() {
        let c = ProcessingConfig::builder()
            .sample_size(0)
            .concurrency(0)
            .temperature(9.0)
            .endpoint(ContentKind::Html, "http://localhost:3001/convert/html-to-dita")
            .build()
            .expect("valid config");
        assert_eq!(c.sample_size, 1);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(
            c.endpoints.for_kind(ContentKind::Html).url.as_deref(),
            Some("http://localhost:3001/convert/html-to-dita")
        );
    }

    #[test]
    fn builder_rejects_non_http_endpoint() {
        let err = ProcessingConfig::builder()
            .endpoint(ContentKind::Markdown, "ftp://example.org/convert")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ProcessingConfig::builder()
            .conversion_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn strict_makes_every_endpoint_mandatory() {
        let e = ConversionEndpoints::default().strict();
        for kind in ContentKind::ALL {
            assert_eq!(e.for_kind(kind).policy, DispatchPolicy::Mandatory);
        }
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", ProcessingConfig::default());
        assert!(dbg.contains("ProcessingConfig"));
        assert!(!dbg.contains("progress_callback"));
    }
}
