//! Pipeline stages for bundle preparation and conversion.
//!
//! Each submodule implements one step. Stages only talk to each other through
//! plain data ([`archive::ArchiveEntry`], [`resolve::Resolution`],
//! [`crate::output::ProcessableFile`]) so each one can be tested alone.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ archive ──▶ resolve ──▶ repackage ──▶ dispatch
//! (.zip/.docx) (entries)  (classify ×5)  (cleanup + zip)  (HTTP)
//! ```
//!
//! 1. [`input`]     — read the upload and route it by extension
//! 2. [`archive`]   — enumerate entries; write the cleaned archive
//! 3. [`classify`]  — one entry → [`crate::kind::ContentKind`], never fails
//! 4. [`resolve`]   — sample, vote, fix the dominant kind
//! 5. [`cleanup`]   — per-kind deterministic rules + one delegated fix pass
//! 6. [`repackage`] — partition entries, run cleanups, rebuild the archive
//! 7. [`dispatch`]  — upload to the kind's conversion endpoint
//!
//! [`capability`] and [`extract`] hold the opaque services the stages lean on.

pub mod archive;
pub mod capability;
pub mod classify;
pub mod cleanup;
pub mod dispatch;
pub mod extract;
pub mod input;
pub mod repackage;
pub mod resolve;
