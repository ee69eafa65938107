//! On-disk response cache keyed by user and request URL.
//!
//! Entries are raw response bodies. Different users may be allowed to see
//! different data, so each user gets their own key space. Concurrent runs may race on the same
//! entry; the last writer wins.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    max_age: Option<Duration>,
    user: String,
}

impl ResponseCache {
    pub fn new(
        dir: impl Into<PathBuf>,
        max_age: Option<Duration>,
        user: Option<&str>,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create cache directory {}", dir.display()))?;
        Ok(Self {
            dir,
            max_age,
            user: user.unwrap_or_default().to_string(),
        })
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(self.user.as_bytes());
        hasher.update([0u8]);
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        let key: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{key}.json"))
    }

    /// Cached body for `url`, if present and fresh. Unreadable entries are misses.
    pub fn get(&self, url: &str) -> Option<String> {
        let path = self.entry_path(url);
        if let Some(max_age) = self.max_age {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            if age > max_age {
                return None;
            }
        }
        fs::read_to_string(&path).ok()
    }

    /// Store a body. Failures are logged, never returned.
    pub fn put(&self, url: &str, body: &str) {
        let path = self.entry_path(url);
        if let Err(e) = fs::write(&path, body) {
            tracing::warn!("Failed to write cache entry {}: {e}", path.display());
        }
    }
}
