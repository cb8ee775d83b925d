//! Content-addressed cache directory keyed by `(id, fingerprint)`. Used both
//! to locate the previously-installed artifact a diff patch applies
//! against, and to retain a downloaded full artifact across a failed
//! install so a retried batch can skip straight to `UPDATING`.

use std::path::{Path, PathBuf};

use tokio::fs;

#[derive(Debug, Clone)]
pub struct CrxCache {
    root: PathBuf,
}

impl CrxCache {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, id: &str, fingerprint: &str) -> PathBuf {
        self.root.join(id).join(fingerprint)
    }

    /// Returns the cached artifact path for `(id, fingerprint)` if present.
    /// A present-but-empty file is treated as corrupt and reported as a miss.
    pub async fn lookup(&self, id: &str, fingerprint: &str) -> Option<PathBuf> {
        let path = self.entry_path(id, fingerprint);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// Copies `source` into the cache under `(id, fingerprint)`, replacing
    /// any existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created or the
    /// copy fails.
    pub async fn store(&self, id: &str, fingerprint: &str, source: &Path) -> std::io::Result<PathBuf> {
        let dest = self.entry_path(id, fingerprint);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(source, &dest).await?;
        Ok(dest)
    }

    /// Removes every cached entry for `id` other than `keep_fingerprint`,
    /// so a long-running engine's cache doesn't grow without bound across
    /// many retries.
    pub async fn prune(&self, id: &str, keep_fingerprint: &str) -> std::io::Result<()> {
        let dir = self.root.join(id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() != keep_fingerprint {
                let _ = fs::remove_file(entry.path()).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_when_nothing_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CrxCache::new(dir.path().to_path_buf());
        assert!(cache.lookup("app1", "fp1").await.is_none());
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CrxCache::new(dir.path().join("cache"));
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("artifact.crx");
        tokio::fs::write(&source, b"crx-bytes").await.unwrap();

        cache.store("app1", "fp1", &source).await.unwrap();
        let cached = cache.lookup("app1", "fp1").await.unwrap();
        assert_eq!(tokio::fs::read(&cached).await.unwrap(), b"crx-bytes");
    }

    #[tokio::test]
    async fn empty_cached_file_is_treated_as_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CrxCache::new(dir.path().to_path_buf());
        let path = dir.path().join("app1");
        tokio::fs::create_dir_all(&path).await.unwrap();
        tokio::fs::write(path.join("fp1"), b"").await.unwrap();

        assert!(cache.lookup("app1", "fp1").await.is_none());
    }
}
