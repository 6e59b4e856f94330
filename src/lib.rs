//! # edgequake-zip2dita
//!
//! Prepare uploaded documentation bundles for DITA conversion.
//!
//! A user uploads a `.zip` of HTML or Markdown pages (or a single `.docx`).
//! This crate decides what the archive mostly contains, cleans every member
//! of that kind, rebuilds the archive with all other members untouched, and
//! posts the result to the matching conversion service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (.zip | .docx)
//!  │
//!  ├─ 1. Input      route by extension, read into memory
//!  ├─ 2. Archive    enumerate entries, keep nested paths
//!  ├─ 3. Resolve    classify ≤ 5 sampled entries, majority vote
//!  ├─ 4. Cleanup    per-kind rules + one delegated LLM fix pass
//!  ├─ 5. Repackage  cleaned entries + untouched assets → new zip
//!  └─ 6. Dispatch   multipart POST to the kind's endpoint (or mock)
//! ```
//!
//! Every LLM call is optional. When a provider is missing, slow or returns
//! garbage, the stage keeps its deterministic result and records a fallback;
//! only archive-level problems and mandatory endpoints fail a submission.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_zip2dita::{process_file, ContentKind, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ProcessingConfig::builder()
//!         .endpoint(ContentKind::Markdown, "http://localhost:3002/convert/markdown-to-dita")
//!         .build()?;
//!     let outcome = process_file("docs.zip", &config).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `zip2dita` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-zip2dita = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod kind;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionEndpoints, DispatchPolicy, EndpointConfig, ProcessingConfig, ProcessingConfigBuilder,
};
pub use error::{CapabilityError, Zip2DitaError};
pub use kind::{ClassificationResult, ClassificationSource, ContentKind};
pub use output::{
    ArchiveAnalysis, ConversionOutcome, EndpointStatus, OutcomeStatus, PreparedBundle,
    ProcessableFile, SampledEntry, StageFallback,
};
pub use pipeline::capability::{CapabilityTask, LlmCapability, OfflineCapability, TextCapability};
pub use pipeline::dispatch::probe_endpoints;
pub use pipeline::extract::{DocumentExtractor, DocxExtractor};
pub use process::{
    analyze_bytes, analyze_file, dispatch_bundle, prepare_bytes, prepare_file, process_bytes,
    process_file, process_file_sync, save_bundle,
};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
