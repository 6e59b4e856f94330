//! Progress-callback trait for per-entry processing events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`] to receive
//! events as the pipeline resolves the dominant kind, cleans each entry and
//! dispatches the bundle.
//!
//! # Example
//!
//! ```rust
//! use edgequake_zip2dita::{ProcessingConfig, ProcessingProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     cleaned: AtomicUsize,
//! }
//!
//! impl ProcessingProgressCallback for CountingCallback {
//!     fn on_entry_complete(&self, path: &str, index: usize, total: usize, cleaned_len: usize) {
//!         self.cleaned.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} bytes)", index + 1, total, path, cleaned_len);
//!     }
//! }
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { cleaned: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::kind::ContentKind;
use crate::output::ConversionOutcome;
use std::sync::Arc;

/// Called by the pipeline as it processes a submission.
///
/// Implementations must be `Send + Sync`: entry cleanups run concurrently, so
/// `on_entry_start`, `on_entry_complete` and `on_entry_fallback` may be called
/// from overlapping tasks. All methods default to no-ops.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called once, before the input is opened.
    fn on_run_start(&self, source_name: &str) {
        let _ = source_name;
    }

    /// Called once the dominant kind is fixed.
    ///
    /// # Arguments
    /// * `kind`      — resolved kind
    /// * `sampled`   — number of entries that were classified
    /// * `processable` — entries that will be cleaned
    fn on_kind_resolved(&self, kind: ContentKind, sampled: usize, processable: usize) {
        let _ = (kind, sampled, processable);
    }

    /// Called just before an entry's cleanup strategy starts.
    ///
    /// `index` is 0-based over the processable entries.
    fn on_entry_start(&self, path: &str, index: usize, total: usize) {
        let _ = (path, index, total);
    }

    /// Called when an entry's cleanup finished (possibly with fallbacks).
    fn on_entry_complete(&self, path: &str, index: usize, total: usize, cleaned_len: usize) {
        let _ = (path, index, total, cleaned_len);
    }

    /// Called each time a stage degrades to its fallback.
    fn on_entry_fallback(&self, path: &str, stage: &str, reason: &str) {
        let _ = (path, stage, reason);
    }

    /// Called just before the bundle is uploaded.
    fn on_dispatch_start(&self, kind: ContentKind, endpoint: Option<&str>) {
        let _ = (kind, endpoint);
    }

    /// Called exactly once with the submission's outcome.
    fn on_run_complete(&self, outcome: &ConversionOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessingConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        fallbacks: AtomicUsize,
    }

    impl ProcessingProgressCallback for TrackingCallback {
        fn on_entry_start(&self, _path: &str, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_entry_complete(&self, _path: &str, _index: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_entry_fallback(&self, _path: &str, _stage: &str, _reason: &str) {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("bundle.zip");
        cb.on_kind_resolved(ContentKind::Html, 3, 3);
        cb.on_entry_start("a.html", 0, 1);
        cb.on_entry_fallback("a.html", "fix_markup", "offline");
        cb.on_entry_complete("a.html", 0, 1, 42);
        cb.on_dispatch_start(ContentKind::Html, None);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_entry_start("a.md", 0, 2);
        tracker.on_entry_complete("a.md", 0, 2, 10);
        tracker.on_entry_start("b.md", 1, 2);
        tracker.on_entry_fallback("b.md", "fix_markdown", "timeout");
        tracker.on_entry_complete("b.md", 1, 2, 20);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start("x.zip");
    }
}
