//! Persistent byte store backing the cache's cold tier.
//!
//! One file per entry, named by its id, in a single directory. Entries are
//! write-once: the first successful [`DiskStore::put`] for an id wins and
//! later puts leave it untouched. Writes go to a temp file that is then
//! hard-linked into place, so readers never see a partially written entry.
//! The temp file is removed whether or not the write succeeds.
//!
//! On filesystems without hard links the entry is created directly with
//! `create_new`. That path is non-atomic: a crash partway through leaves a
//! truncated entry, and write-once semantics then keep it until the file is
//! deleted by hand.
//!
//! # Degradation
//!
//! If the configured directory cannot be created, the store falls back to a
//! directory under the system temp dir and logs a warning. Entries written
//! there may not survive a restart; [`DiskStore::is_persistent`] reports
//! which mode is active.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    persistent: bool,
}

impl DiskStore {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// Never fails: an unusable `root` degrades to a transient location.
    pub fn open(root: &Path) -> Self {
        match std::fs::create_dir_all(root) {
            Ok(()) => Self {
                root: root.to_path_buf(),
                persistent: true,
            },
            Err(e) => {
                let fallback = Self::transient_root();
                warn!(
                    root = %root.display(),
                    fallback = %fallback.display(),
                    error = %e,
                    "cannot create disk cache directory; cached images will not persist across restarts"
                );
                Self {
                    root: fallback,
                    persistent: false,
                }
            }
        }
    }

    fn transient_root() -> PathBuf {
        let dir = std::env::temp_dir().join("photo-search");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => dir,
            Err(_) => std::env::temp_dir(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// False when running on the temp-dir fallback.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    fn entry_path(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\'])
            && !id.chars().any(char::is_control);
        if !valid {
            return Err(Error::Storage(format!("invalid entry id: {:?}", id)));
        }
        Ok(self.root.join(id))
    }

    /// Store `bytes` under `id` unless an entry already exists.
    ///
    /// Returns `true` if this call created the entry.
    pub async fn put(&self, id: &str, bytes: &[u8]) -> Result<bool> {
        let path = self.entry_path(id)?;
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }

        let tmp = TempEntry::new(&self.root);
        tokio::fs::write(&tmp.path, bytes).await?;

        let linked = tokio::fs::hard_link(&tmp.path, &path).await;
        drop(tmp);

        match linked {
            Ok(()) => {
                debug!(id, len = bytes.len(), "disk entry written");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            // Filesystems without hard links: exclusive create, non-atomic.
            Err(_) => write_exclusive(&path, bytes).await,
        }
    }

    /// Read the entry for `id`, if present.
    pub async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        let path = self.entry_path(id)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Ids of all stored entries, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with(TMP_PREFIX) {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Temp file in the store root, removed when dropped.
struct TempEntry {
    path: PathBuf,
}

impl TempEntry {
    fn new(root: &Path) -> Self {
        Self {
            path: root.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4())),
        }
    }
}

impl Drop for TempEntry {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn write_exclusive(path: &Path, bytes: &[u8]) -> Result<bool> {
    use tokio::io::AsyncWriteExt;

    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await;
    match file {
        Ok(mut f) => {
            f.write_all(bytes).await?;
            f.flush().await?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}
