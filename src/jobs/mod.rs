//! Extraction jobs.
//!
//! Each job takes an already connected client and a resolved output
//! directory, runs its extraction and registers the files it writes with the
//! run context. CLI layers own connection setup and output directory
//! resolution.

pub(crate) mod analytics;
mod context;
pub(crate) mod metadata;

pub(crate) use context::RunContext;
