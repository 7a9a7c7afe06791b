//! Single-writer guard for an index directory.
//!
//! `ingest` holds an [`IndexLock`] from before it reads the snapshot until
//! after it writes it back, so two processes never ingest into the same
//! directory at once. Readers do not lock.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{debug, warn};

/// File name of the lock inside the index directory.
pub const LOCK_FILE: &str = "ingest.lock";

/// Removes the lock file when dropped.
#[derive(Debug)]
pub struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    /// Take the lock on `index_dir`, creating the directory if needed.
    ///
    /// Fails straight away if another writer holds it. A lock left behind by
    /// a killed process has to be removed by hand.
    pub fn acquire(index_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(index_dir)
            .with_context(|| format!("failed to create {}", index_dir.display()))?;

        let path = index_dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                debug!(path = %path.display(), "acquired index lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => bail!(
                "another ingest is writing to {}; if none is running, delete {}",
                index_dir.display(),
                path.display()
            ),
            Err(e) => Err(e).with_context(|| format!("failed to create {}", path.display())),
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release index lock");
        }
    }
}
