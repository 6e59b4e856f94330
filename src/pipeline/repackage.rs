//! Partition entries by the dominant kind, clean the processable ones and
//! write the result back into a new archive.
//!
//! Partitioning uses the dominant kind's extension family, not a per-entry
//! classification: in an archive resolved as Markdown, `.html` members are
//! carried over untouched as assets. An archive resolved as a structured
//! document also cleans its `.html`/`.htm`/`.md` members with the structured
//! strategy, since those are the entries that were sampled.

use crate::error::Zip2DitaError;
use crate::kind::{is_candidate, ContentKind};
use crate::output::ProcessableFile;
use crate::pipeline::archive::{write_archive, ArchiveEntry};
use crate::pipeline::cleanup::{CleanupContext, CleanupStrategy};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

/// A rebuilt archive and what went into it.
#[derive(Debug, Clone)]
pub struct Repackaged {
    pub archive: Vec<u8>,
    /// Cleaned entries, in enumeration order.
    pub processed: Vec<ProcessableFile>,
    pub asset_count: usize,
    /// Directory pseudo-entries (never written).
    pub excluded_count: usize,
}

/// Which bucket an entry lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    Processable,
    Asset,
    Excluded,
}

pub fn role_of(entry: &ArchiveEntry, kind: ContentKind) -> EntryRole {
    if entry.is_dir {
        EntryRole::Excluded
    } else if kind.matches_path(&entry.path)
        || (kind == ContentKind::StructuredDoc && is_candidate(&entry.path))
    {
        EntryRole::Processable
    } else {
        EntryRole::Asset
    }
}

/// Clean every processable entry and rebuild the archive.
///
/// Up to `concurrency` cleanups run at once; results keep enumeration order.
pub async fn repackage(
    entries: &[ArchiveEntry],
    kind: ContentKind,
    ctx: CleanupContext<'_>,
) -> Result<Repackaged, Zip2DitaError> {
    let strategy = CleanupStrategy::for_kind(kind);
    let targets: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|e| role_of(e, kind) == EntryRole::Processable)
        .collect();
    let total = targets.len();

    info!("Cleaning {} {} entries", total, kind.label());

    let processed: Vec<ProcessableFile> = stream::iter(targets.iter().enumerate().map(
        |(index, entry)| async move {
            ctx.progress.on_entry_start(&entry.path, index, total);
            let file = strategy
                .clean(ctx, &entry.path, entry.read_bytes().to_vec())
                .await;
            ctx.progress
                .on_entry_complete(&file.path, index, total, file.cleaned.len());
            file
        },
    ))
    .buffered(ctx.config.concurrency.max(1))
    .collect()
    .await;

    let mut cleaned = processed.iter();
    let mut files: Vec<(&str, &[u8])> = Vec::with_capacity(entries.len());
    let mut asset_count = 0;
    let mut excluded_count = 0;

    for entry in entries {
        match role_of(entry, kind) {
            EntryRole::Excluded => excluded_count += 1,
            EntryRole::Processable => {
                let file = cleaned.next().ok_or_else(|| {
                    Zip2DitaError::Internal(format!("no cleaned output for '{}'", entry.path))
                })?;
                files.push((file.path.as_str(), file.cleaned.as_bytes()));
            }
            EntryRole::Asset => {
                debug!("Passing through '{}'", entry.path);
                asset_count += 1;
                files.push((entry.path.as_str(), entry.read_bytes()));
            }
        }
    }

    let archive = write_archive(files)?;
    Ok(Repackaged {
        archive,
        processed,
        asset_count,
        excluded_count,
    })
}

/// Clean a standalone structured document into a one-entry archive named
/// after the upload.
pub async fn repackage_document(
    file_name: &str,
    bytes: &[u8],
    ctx: CleanupContext<'_>,
) -> Result<Repackaged, Zip2DitaError> {
    ctx.progress.on_entry_start(file_name, 0, 1);
    let file = CleanupStrategy::StructuredDoc
        .clean(ctx, file_name, bytes.to_vec())
        .await;
    ctx.progress
        .on_entry_complete(&file.path, 0, 1, file.cleaned.len());

    let archive = write_archive([(file.path.as_str(), file.cleaned.as_bytes())])?;
    Ok(Repackaged {
        archive,
        processed: vec![file],
        asset_count: 0,
        excluded_count: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::archive::open_archive;
    use crate::pipeline::cleanup::testing::{ctx, offline, Echo};

    fn entries() -> Vec<ArchiveEntry> {
        vec![
            ArchiveEntry::new("a.md", b"no title".to_vec()),
            ArchiveEntry::new("b.html", b"<p class=\"x\">b</p>".to_vec()),
            ArchiveEntry::new("c.png", vec![0x89, 0x50, 0x4E, 0x47, 0x00, 0xFF]),
            ArchiveEntry::directory("d/"),
            ArchiveEntry::new("d/e.md", b"# E\n\n\n\nbody  ".to_vec()),
        ]
    }

    #[test]
    fn roles_follow_the_dominant_family() {
        let e = entries();
        let roles: Vec<EntryRole> = e.iter().map(|x| role_of(x, ContentKind::Markdown)).collect();
        assert_eq!(
            roles,
            vec![
                EntryRole::Processable,
                EntryRole::Asset,
                EntryRole::Asset,
                EntryRole::Excluded,
                EntryRole::Processable
            ]
        );
    }

    #[test]
    fn structured_vote_makes_text_entries_processable() {
        let mut e = entries();
        e.push(ArchiveEntry::new("manual.docx", b"PK".to_vec()));
        let roles: Vec<EntryRole> = e
            .iter()
            .map(|x| role_of(x, ContentKind::StructuredDoc))
            .collect();
        assert_eq!(
            roles,
            vec![
                EntryRole::Processable,
                EntryRole::Processable,
                EntryRole::Asset,
                EntryRole::Excluded,
                EntryRole::Processable,
                EntryRole::Processable
            ]
        );
    }

    #[tokio::test]
    async fn structured_archive_restructures_text_entries() {
        let source = entries();
        let cap = Echo { title: "unused" };
        let out = repackage(&source, ContentKind::StructuredDoc, ctx(&cap))
            .await
            .unwrap();

        let paths: Vec<&str> = out.processed.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.html", "d/e.md"]);
        assert_eq!(out.asset_count, 1);
        assert!(out.processed.iter().all(|f| f.fallbacks.is_empty()));
        assert_eq!(out.processed[1].cleaned, "<p class=\"x\">b</p>");
    }

    #[tokio::test]
    async fn markdown_archive_is_rebuilt_with_assets_untouched() {
        let source = entries();
        let cap = Echo { title: "unused" };
        let out = repackage(&source, ContentKind::Markdown, ctx(&cap))
            .await
            .unwrap();

        assert_eq!(out.processed.len(), 2);
        assert_eq!(out.asset_count, 2);
        assert_eq!(out.excluded_count, 1);

        let rebuilt = open_archive("out.zip", &out.archive).unwrap();
        let paths: Vec<&str> = rebuilt.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.html", "c.png", "d/e.md"]);
        assert_eq!(rebuilt[1].read_bytes(), b"<p class=\"x\">b</p>");
        assert_eq!(rebuilt[2].read_bytes(), source[2].read_bytes());
        assert_eq!(rebuilt[3].read_text(), "# E\n\nbody");
        assert!(rebuilt[0].read_text().starts_with("# "));
    }

    #[tokio::test]
    async fn cleaned_entries_keep_enumeration_order() {
        let source: Vec<ArchiveEntry> = (0..6)
            .map(|i| ArchiveEntry::new(format!("p{i}.html"), format!("<p>{i}</p>").into_bytes()))
            .collect();
        let out = repackage(&source, ContentKind::Html, offline()).await.unwrap();
        let paths: Vec<&str> = out.processed.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["p0.html", "p1.html", "p2.html", "p3.html", "p4.html", "p5.html"]);
    }

    #[tokio::test]
    async fn standalone_document_becomes_one_entry_archive() {
        let out = repackage_document("notes.docx", b"plain", offline()).await.unwrap();
        let rebuilt = open_archive("out.zip", &out.archive).unwrap();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].path, "notes.docx");
        assert_eq!(rebuilt[0].read_text(), "plain");
    }
}
