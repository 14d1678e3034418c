//! Snapshot persistence sinks.
//!
//! A sink stores one opaque blob per site and hands them all back at
//! startup. It never interprets the bytes.

use crate::error::SinkError;
use aolt_types::SiteId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Durable storage for per-site snapshot blobs.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Replaces the stored blob for `site`.
    async fn store(&self, site: &SiteId, blob: &[u8]) -> Result<(), SinkError>;

    /// Every stored blob, ordered by site.
    async fn load_all(&self) -> Result<Vec<(SiteId, Vec<u8>)>, SinkError>;
}

const TMP_SUFFIX: &str = ".tmp";

/// One file per site in a backup directory, named after the site.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(site: &SiteId) -> Result<&str, SinkError> {
        let key = site.as_str();
        if key.starts_with('.') || key.contains(&['/', '\\', '\0'][..]) || key.ends_with(TMP_SUFFIX) {
            return Err(SinkError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(key)
    }
}

#[async_trait]
impl SnapshotSink for DirectorySink {
    async fn store(&self, site: &SiteId, blob: &[u8]) -> Result<(), SinkError> {
        let name = Self::file_name(site)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SinkError::io(name, e))?;

        // Write then rename so a crash never leaves a truncated snapshot.
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}{TMP_SUFFIX}"));
        tokio::fs::write(&tmp, blob)
            .await
            .map_err(|e| SinkError::io(name, e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| SinkError::io(name, e))?;
        debug!(site = %site, bytes = blob.len(), path = %target.display(), "stored snapshot");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(SiteId, Vec<u8>)>, SinkError> {
        let dir_key = self.dir.display().to_string();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SinkError::io(dir_key, e)),
        };

        let mut blobs = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SinkError::io(dir_key.as_str(), e))?
        {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SinkError::io(name, e))?;
            if !file_type.is_file() {
                continue;
            }
            let site = match SiteId::new(name) {
                Ok(site) => site,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping snapshot file");
                    continue;
                }
            };
            let blob = tokio::fs::read(&path)
                .await
                .map_err(|e| SinkError::io(name, e))?;
            blobs.insert(site, blob);
        }
        Ok(blobs.into_iter().collect())
    }
}

/// Sink that keeps blobs in memory. It can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MemorySink {
    blobs: Mutex<BTreeMap<SiteId, Vec<u8>>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `store` call fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, site: &SiteId) -> Option<Vec<u8>> {
        self.blobs.lock().get(site).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn store(&self, site: &SiteId, blob: &[u8]) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::unavailable("memory sink set to fail"));
        }
        self.blobs.lock().insert(site.clone(), blob.to_vec());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(SiteId, Vec<u8>)>, SinkError> {
        Ok(self
            .blobs
            .lock()
            .iter()
            .map(|(site, blob)| (site.clone(), blob.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn site(id: &str) -> SiteId {
        SiteId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_directory_sink_round_trip() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path().join("backup"));

        assert!(sink.load_all().await.unwrap().is_empty());

        sink.store(&site("SITE2"), b"two").await.unwrap();
        sink.store(&site("SITE1"), b"one").await.unwrap();
        sink.store(&site("SITE1"), b"one-v2").await.unwrap();

        let loaded = sink.load_all().await.unwrap();
        assert_eq!(
            loaded,
            vec![
                (site("SITE1"), b"one-v2".to_vec()),
                (site("SITE2"), b"two".to_vec()),
            ]
        );
        assert!(dir.path().join("backup").join("SITE1").is_file());
    }

    #[tokio::test]
    async fn test_directory_sink_skips_temp_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("SITE1.tmp"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let sink = DirectorySink::new(dir.path());
        assert!(sink.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_sink_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path());
        for key in ["../escape", "a/b", ".hidden"] {
            assert!(matches!(
                sink.store(&site(key), b"x").await,
                Err(SinkError::InvalidKey { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_memory_sink_failure_mode() {
        let sink = MemorySink::new();
        sink.set_failing(true);
        assert!(sink.store(&site("SITE1"), b"x").await.is_err());
        assert!(sink.is_empty());
        sink.set_failing(false);
        sink.store(&site("SITE1"), b"x").await.unwrap();
        assert_eq!(sink.get(&site("SITE1")), Some(b"x".to_vec()));
        assert_eq!(sink.len(), 1);
    }
}
