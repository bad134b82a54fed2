pub mod error;
pub mod models;
pub mod queries;

pub use error::{Result, StoreError};
pub use models::{ChirpRecord, Document, RevokedTokenRecord, UserRecord};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Single-file JSON document store.
///
/// Every operation runs a full cycle against the backing file while holding
/// the lock: readers share it for load -> read, writers hold it exclusively
/// for load -> mutate -> persist. The file is only reachable through the
/// guard, so no writer's persist can interleave with another writer's load.
pub struct Datastore {
    file: RwLock<DocumentFile>,
    lock_timeout: Option<Duration>,
}

/// Handle to the backing file. Only ever touched while holding the lock.
struct DocumentFile {
    path: PathBuf,
}

impl Datastore {
    /// Open the store at `path`, creating an empty document if the file does
    /// not exist yet. A file that exists but cannot be loaded is an error.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = DocumentFile {
            path: path.to_path_buf(),
        };

        if !path.exists() {
            file.persist(&Document::default())?;
            info!("Created empty datastore at {}", path.display());
        }

        // Fail at startup rather than on the first request
        let doc = file.load()?;

        info!(
            "Datastore opened at {} ({} users, {} chirps, {} revoked tokens)",
            path.display(),
            doc.users.len(),
            doc.chirps.len(),
            doc.revoked_tokens.len()
        );
        Ok(Self {
            file: RwLock::new(file),
            lock_timeout: None,
        })
    }

    /// Bound how long each operation waits for the lock. An operation that
    /// times out fails with [`StoreError::LockTimeout`] and changes nothing.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Delete the backing file at `path` if it exists.
    pub fn reset(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                warn!("Removed datastore file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `f` against a freshly loaded snapshot under the shared lock.
    pub(crate) fn with_document<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Document) -> Result<T>,
    {
        let file = self.read_guard()?;
        let doc = file.load()?;
        f(&doc)
    }

    /// Load, mutate and persist under the exclusive lock. If `f` fails the
    /// mutated copy is dropped and nothing is written.
    pub(crate) fn with_document_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        let file = self.write_guard()?;
        let mut doc = file.load()?;
        let out = f(&mut doc)?;
        file.persist(&doc)?;
        Ok(out)
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, DocumentFile>> {
        match self.lock_timeout {
            Some(timeout) => self
                .file
                .try_read_for(timeout)
                .ok_or(StoreError::LockTimeout),
            None => Ok(self.file.read()),
        }
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, DocumentFile>> {
        match self.lock_timeout {
            Some(timeout) => self
                .file
                .try_write_for(timeout)
                .ok_or(StoreError::LockTimeout),
            None => Ok(self.file.write()),
        }
    }
}

impl DocumentFile {
    fn load(&self) -> Result<Document> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the whole document to a sibling temp file, then rename it over
    /// the target so readers only ever see a complete document. The parent
    /// directory is synced afterwards so the rename survives a crash.
    fn persist(&self, doc: &Document) -> Result<()> {
        let payload = serde_json::to_vec(doc)?;
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let written = write_synced(&temp_path, &payload)
            .and_then(|()| fs::rename(&temp_path, &self.path));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        sync_parent_dir(&self.path)?;
        Ok(())
    }
}

fn write_synced(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(payload)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::File::open(dir)?.sync_all()
}

// Directories cannot be opened as files here; the rename is all we get.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
