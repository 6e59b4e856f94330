//! Top-level entry points.
//!
//! Two families:
//!
//! * `process_*` always return a [`ConversionOutcome`]. Fatal errors become a
//!   `Failed` outcome carrying the error text, so a caller serving uploads
//!   can hand the record back as-is.
//! * `prepare_*`, [`dispatch_bundle`] and `analyze_*` return `Result` and
//!   let library callers stop between stages: inspect the cleaned bundle,
//!   save it, or only look at the type vote.

use crate::config::ProcessingConfig;
use crate::error::Zip2DitaError;
use crate::kind::ContentKind;
use crate::output::{ArchiveAnalysis, ConversionOutcome, OutcomeStatus, PreparedBundle};
use crate::pipeline::archive::open_archive;
use crate::pipeline::capability::resolve_capability;
use crate::pipeline::cleanup::CleanupContext;
use crate::pipeline::dispatch::{dispatch, ensure_endpoint};
use crate::pipeline::extract::{DocumentExtractor, DocxExtractor};
use crate::pipeline::input::{read_submission, Submission, SubmissionKind};
use crate::pipeline::repackage::{repackage, repackage_document, role_of, EntryRole};
use crate::pipeline::resolve::{resolve_dominant, DominantTypeVote};
use crate::progress::{NoopProgressCallback, ProcessingProgressCallback};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Process an upload on disk end to end.
///
/// # Example
/// ```rust,no_run
/// use edgequake_zip2dita::{process_file, ContentKind, ProcessingConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = ProcessingConfig::builder()
///     .endpoint(ContentKind::Html, "http://localhost:3001/convert/html-to-dita")
///     .build()
///     .unwrap();
/// let outcome = process_file("site.zip", &config).await;
/// println!("{:?} {:?}", outcome.status, outcome.download_link);
/// # }
/// ```
pub async fn process_file(path: impl AsRef<Path>, config: &ProcessingConfig) -> ConversionOutcome {
    let path = path.as_ref();
    let name = display_name(path);
    let submission = read_submission(path).await;
    run(&name, submission, config).await
}

/// Process an in-memory upload. `file_name` decides the route.
pub async fn process_bytes(
    bytes: Vec<u8>,
    file_name: &str,
    config: &ProcessingConfig,
) -> ConversionOutcome {
    let submission = Submission::from_bytes(file_name, bytes);
    run(file_name, submission, config).await
}

/// Synchronous wrapper around [`process_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_file_sync(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<ConversionOutcome, Zip2DitaError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| Zip2DitaError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_file(path, config)))
}

async fn run(
    name: &str,
    submission: Result<Submission, Zip2DitaError>,
    config: &ProcessingConfig,
) -> ConversionOutcome {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let progress = progress_of(config);
    info!("Processing '{}' (request {})", name, request_id);
    progress.on_run_start(name);

    let mut outcome = match submission {
        Err(e) => ConversionOutcome::failed(&request_id, name, None, (0, 0), &e),
        Ok(submission) => match prepare(submission, request_id.clone(), config, true).await {
            Err(halted) => {
                ConversionOutcome::failed(&request_id, name, halted.kind, (0, 0), &halted.error)
            }
            Ok(bundle) => match dispatch_bundle(&bundle, config).await {
                Ok(outcome) => outcome,
                Err(e) => ConversionOutcome::failed(
                    &request_id,
                    name,
                    Some(bundle.kind),
                    (bundle.processed.len(), bundle.asset_count),
                    &e,
                ),
            },
        },
    };
    outcome.duration_ms = start.elapsed().as_millis() as u64;

    match outcome.status {
        OutcomeStatus::Success => info!(
            "'{}' done in {}ms: {} processed, {} assets{}",
            name,
            outcome.duration_ms,
            outcome.processed_count,
            outcome.asset_count,
            if outcome.mock { " (mock conversion)" } else { "" }
        ),
        OutcomeStatus::Failed => warn!(
            "'{}' failed: {}",
            name,
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    }
    progress.on_run_complete(&outcome);
    outcome
}

// ── Preparation ──────────────────────────────────────────────────────────

/// Read, resolve and clean an upload on disk, stopping before dispatch.
pub async fn prepare_file(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<PreparedBundle, Zip2DitaError> {
    let submission = read_submission(path.as_ref()).await?;
    prepare(submission, Uuid::new_v4().to_string(), config, false)
        .await
        .map_err(|halted| halted.error)
}

/// In-memory counterpart of [`prepare_file`].
pub async fn prepare_bytes(
    bytes: Vec<u8>,
    file_name: &str,
    config: &ProcessingConfig,
) -> Result<PreparedBundle, Zip2DitaError> {
    let submission = Submission::from_bytes(file_name, bytes)?;
    prepare(submission, Uuid::new_v4().to_string(), config, false)
        .await
        .map_err(|halted| halted.error)
}

/// Why preparation stopped, with the kind if it was already resolved.
struct Halted {
    kind: Option<ContentKind>,
    error: Zip2DitaError,
}

impl From<Zip2DitaError> for Halted {
    fn from(error: Zip2DitaError) -> Self {
        Self { kind: None, error }
    }
}

/// With `dispatch_next`, a mandatory kind without an endpoint stops the run
/// as soon as the kind is known, before any cleanup call.
async fn prepare(
    submission: Submission,
    request_id: String,
    config: &ProcessingConfig,
    dispatch_next: bool,
) -> Result<PreparedBundle, Halted> {
    let preflight = |kind: ContentKind| -> Result<(), Halted> {
        if dispatch_next {
            ensure_endpoint(kind, config).map_err(|error| Halted {
                kind: Some(kind),
                error,
            })?;
        }
        Ok(())
    };

    let capability = resolve_capability(config);
    let progress = progress_of(config);
    let extractor: &dyn DocumentExtractor = match config.extractor.as_deref() {
        Some(extractor) => extractor,
        None => &DocxExtractor,
    };
    let ctx = CleanupContext {
        capability: capability.as_ref(),
        extractor,
        config,
        progress,
    };

    let (kind, repackaged, sampled) = match submission.kind {
        SubmissionKind::Archive => {
            let entries = open_archive(&submission.name, &submission.bytes)?;
            let resolution =
                resolve_dominant(&submission.name, &entries, capability.as_ref(), config).await?;
            let processable = entries
                .iter()
                .filter(|e| role_of(e, resolution.dominant) == EntryRole::Processable)
                .count();
            progress.on_kind_resolved(resolution.dominant, resolution.sampled.len(), processable);
            preflight(resolution.dominant)?;

            let repackaged = repackage(&entries, resolution.dominant, ctx).await?;
            (resolution.dominant, repackaged, resolution.sampled.len())
        }
        SubmissionKind::StructuredDocument => {
            progress.on_kind_resolved(ContentKind::StructuredDoc, 0, 1);
            preflight(ContentKind::StructuredDoc)?;
            let repackaged = repackage_document(&submission.name, &submission.bytes, ctx).await?;
            (ContentKind::StructuredDoc, repackaged, 0)
        }
    };

    let bundle = PreparedBundle {
        request_id,
        source_name: submission.name,
        kind,
        archive: repackaged.archive,
        processed: repackaged.processed,
        asset_count: repackaged.asset_count,
        excluded_count: repackaged.excluded_count,
        sampled,
    };
    info!(
        "Prepared {} bundle for '{}': {} processed, {} assets, {} fallbacks, {} bytes",
        bundle.kind.label(),
        bundle.source_name,
        bundle.processed.len(),
        bundle.asset_count,
        bundle.fallback_count(),
        bundle.archive.len()
    );
    Ok(bundle)
}

// ── Dispatch ─────────────────────────────────────────────────────────────

/// Send a prepared bundle to its kind's conversion endpoint.
///
/// Best-effort kinds always succeed (possibly with a mock); mandatory kinds
/// return `Err` on a missing endpoint or a failed upload.
pub async fn dispatch_bundle(
    bundle: &PreparedBundle,
    config: &ProcessingConfig,
) -> Result<ConversionOutcome, Zip2DitaError> {
    let endpoint = config.endpoints.for_kind(bundle.kind).url.as_deref();
    progress_of(config).on_dispatch_start(bundle.kind, endpoint);

    let dispatched = dispatch(&bundle.archive, &bundle.request_id, bundle.kind, config).await?;
    Ok(ConversionOutcome {
        request_id: bundle.request_id.clone(),
        source_name: bundle.source_name.clone(),
        kind: Some(bundle.kind),
        processed_count: bundle.processed.len(),
        asset_count: bundle.asset_count,
        status: OutcomeStatus::Success,
        download_link: Some(dispatched.reply.download_link),
        message: dispatched.reply.message,
        error: None,
        mock: dispatched.mock,
        duration_ms: 0,
    })
}

// ── Analysis ─────────────────────────────────────────────────────────────

/// Sample and vote without cleaning or dispatching.
pub async fn analyze_file(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<ArchiveAnalysis, Zip2DitaError> {
    let submission = read_submission(path.as_ref()).await?;
    analyze(submission, config).await
}

/// In-memory counterpart of [`analyze_file`].
pub async fn analyze_bytes(
    bytes: Vec<u8>,
    file_name: &str,
    config: &ProcessingConfig,
) -> Result<ArchiveAnalysis, Zip2DitaError> {
    analyze(Submission::from_bytes(file_name, bytes)?, config).await
}

async fn analyze(
    submission: Submission,
    config: &ProcessingConfig,
) -> Result<ArchiveAnalysis, Zip2DitaError> {
    if submission.kind == SubmissionKind::StructuredDocument {
        // A lone document has nothing to vote on.
        return Ok(ArchiveAnalysis {
            source_name: submission.name,
            total_entries: 1,
            directories: 0,
            candidates: 0,
            sampled: Vec::new(),
            votes: DominantTypeVote::new(),
            dominant: ContentKind::StructuredDoc,
        });
    }

    let capability = resolve_capability(config);
    let entries = open_archive(&submission.name, &submission.bytes)?;
    let resolution =
        resolve_dominant(&submission.name, &entries, capability.as_ref(), config).await?;

    Ok(ArchiveAnalysis {
        source_name: submission.name,
        total_entries: entries.len(),
        directories: entries.iter().filter(|e| e.is_dir).count(),
        candidates: resolution.candidates,
        sampled: resolution.sampled,
        votes: resolution.votes,
        dominant: resolution.dominant,
    })
}

// ── Output ───────────────────────────────────────────────────────────────

/// Write the cleaned archive to `path`.
///
/// Uses atomic write (temp file in the target directory + rename) so a crash
/// never leaves a truncated archive behind.
pub fn save_bundle(bundle: &PreparedBundle, path: impl AsRef<Path>) -> Result<(), Zip2DitaError> {
    let path = path.as_ref();
    let write_failed = |source: std::io::Error| Zip2DitaError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(&bundle.archive).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    info!("Saved cleaned bundle to {}", path.display());
    Ok(())
}

fn progress_of(config: &ProcessingConfig) -> &dyn ProcessingProgressCallback {
    match config.progress_callback.as_deref() {
        Some(cb) => cb,
        None => &NoopProgressCallback,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
