//! Output directory resolution and retention of default run directories.
//!
//! Default directories are named after the local time they were created at,
//! so a later run can tell their age from the name alone and sweep the stale
//! ones. The sweep is best-effort: no locking, no transaction.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Default directories older than this are deleted by the sweep.
pub const RETENTION: Duration = Duration::days(31);

/// `YYYY-MM-DD_HH-MM-SS-ffffff`. Colons are avoided so the name is valid on
/// every filesystem.
const DIR_NAME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]_[hour]-[minute]-[second]-[subsecond digits:6]"
);

/// Current local wall-clock time, or UTC when the local offset is unknown.
pub fn local_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    PrimitiveDateTime::new(now.date(), now.time())
}

pub fn format_dir_name(t: PrimitiveDateTime) -> Result<String> {
    t.format(DIR_NAME_FORMAT)
        .context("format output directory timestamp")
}

pub fn parse_dir_name(name: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(name, DIR_NAME_FORMAT).ok()
}

/// Resolve the directory a job writes into, creating it if needed.
///
/// An explicit directory is joined under `workspace` and used as-is. Without
/// one, a timestamped directory is created under `default_base` and stale
/// siblings are swept afterwards.
pub fn resolve_output_dir(
    explicit: Option<&Path>,
    workspace: &Path,
    default_base: &Path,
) -> Result<PathBuf> {
    match explicit {
        Some(dir) => {
            let dir = workspace.join(dir);
            fs::create_dir_all(&dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
            Ok(dir)
        }
        None => {
            let now = local_now();
            let dir = default_base.join(format_dir_name(now)?);
            fs::create_dir_all(&dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
            clean_default_output_dir(default_base, now)?;
            Ok(dir)
        }
    }
}

/// Delete timestamped child directories of `base` older than [`RETENTION`]
/// at `now`. Children whose names do not parse as a timestamp are left alone,
/// as are plain files. A directory that cannot be removed is logged and
/// skipped. Only failing to open `base` is an error. Returns the removed paths.
pub fn clean_default_output_dir(base: &Path, now: PrimitiveDateTime) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(base).with_context(|| format!("read directory {}", base.display()))?;

    let mut removed = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to read an entry of {}: {e}", base.display());
                continue;
            }
        };
        let name = entry.file_name();
        let Some(created) = name.to_str().and_then(parse_dir_name) else {
            tracing::debug!(name = ?name, "skipping non-timestamped entry");
            continue;
        };
        if now - created <= RETENTION {
            continue;
        }
        let path = entry.path();
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            tracing::debug!("skipping non-directory {}", path.display());
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!("Removed stale output directory {}", path.display());
                removed.push(path);
            }
            // Another run may have swept it first.
            Err(e) => tracing::warn!("Failed to remove stale output directory {}: {e}", path.display()),
        }
    }
    Ok(removed)
}
