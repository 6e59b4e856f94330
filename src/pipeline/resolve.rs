//! Dominant-type resolution: sample, classify, vote.
//!
//! Only a bounded prefix of the eligible entries is classified
//! (`sample_size`, default 5). The winner then governs the whole archive,
//! including the entries that were never sampled.

use crate::config::ProcessingConfig;
use crate::error::Zip2DitaError;
use crate::kind::{extension_of, is_candidate, ContentKind};
use crate::output::SampledEntry;
use crate::pipeline::archive::ArchiveEntry;
use crate::pipeline::capability::TextCapability;
use crate::pipeline::classify::classify;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One kind's count in a [`DominantTypeVote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTally {
    pub kind: ContentKind,
    pub count: usize,
}

/// Ordered tally of classified kinds, in first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantTypeVote {
    tallies: Vec<KindTally>,
}

impl DominantTypeVote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ContentKind) {
        match self.tallies.iter_mut().find(|t| t.kind == kind) {
            Some(t) => t.count += 1,
            None => self.tallies.push(KindTally { kind, count: 1 }),
        }
    }

    /// Most frequent kind; on a tie the kind seen first wins.
    pub fn winner(&self) -> Option<ContentKind> {
        let mut best: Option<KindTally> = None;
        for tally in &self.tallies {
            if best.map_or(true, |b| tally.count > b.count) {
                best = Some(*tally);
            }
        }
        best.map(|b| b.kind)
    }

    pub fn count(&self, kind: ContentKind) -> usize {
        self.tallies
            .iter()
            .find(|t| t.kind == kind)
            .map_or(0, |t| t.count)
    }

    /// Number of recorded votes.
    pub fn total(&self) -> usize {
        self.tallies.iter().map(|t| t.count).sum()
    }

    pub fn tallies(&self) -> &[KindTally] {
        &self.tallies
    }
}

/// The fixed outcome of sampling, decided before any cleanup starts.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub dominant: ContentKind,
    pub votes: DominantTypeVote,
    pub sampled: Vec<SampledEntry>,
    /// Entries eligible for sampling, sampled or not.
    pub candidates: usize,
}

/// Classify the first `sample_size` candidate entries and pick the majority kind.
///
/// Classifications are awaited one at a time in enumeration order.
pub async fn resolve_dominant(
    source_name: &str,
    entries: &[ArchiveEntry],
    capability: &dyn TextCapability,
    config: &ProcessingConfig,
) -> Result<Resolution, Zip2DitaError> {
    let candidates: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|e| !e.is_dir && is_candidate(&e.path))
        .collect();

    if candidates.is_empty() {
        return Err(Zip2DitaError::NoEligibleContent {
            name: source_name.to_string(),
            entries: entries.len(),
        });
    }

    let mut votes = DominantTypeVote::new();
    let mut sampled = Vec::with_capacity(config.sample_size.min(candidates.len()));

    for entry in candidates.iter().take(config.sample_size) {
        let extension = extension_of(&entry.path).unwrap_or_default();
        let classification = classify(capability, &entry.read_text(), &extension, config).await;
        debug!("Sample '{}' → {}", entry.path, classification.kind);
        votes.record(classification.kind);
        sampled.push(SampledEntry {
            path: entry.path.clone(),
            classification,
        });
    }

    let dominant = votes
        .winner()
        .ok_or_else(|| Zip2DitaError::Internal("vote recorded no kinds".into()))?;

    info!(
        "Dominant kind for '{}': {} ({} of {} samples, {} candidates)",
        source_name,
        dominant,
        votes.count(dominant),
        votes.total(),
        candidates.len()
    );

    Ok(Resolution {
        dominant,
        votes,
        sampled,
        candidates: candidates.len(),
    })
}
