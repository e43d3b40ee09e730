//! # File Lock Implementation
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on Windows).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors from run locking
#[derive(Debug)]
pub enum LockError {
    /// Lock file could not be created
    CreateFailed(io::Error),
    /// Another run holds the lock
    AlreadyLocked { pid: Option<u32>, path: PathBuf },
    /// Failed to write PID to lock file
    WriteFailed(io::Error),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::CreateFailed(e) => write!(f, "Failed to create lock file: {}", e),
            LockError::AlreadyLocked { pid, path } => {
                if let Some(p) = pid {
                    write!(
                        f,
                        "Another run is in progress in process {} ({})",
                        p,
                        path.display()
                    )
                } else {
                    write!(f, "Another run is in progress ({})", path.display())
                }
            }
            LockError::WriteFailed(e) => write!(f, "Failed to write PID to lock file: {}", e),
        }
    }
}

impl std::error::Error for LockError {}

// =============================================================================
// RUN LOCK
// =============================================================================

/// Exclusive, non-blocking lock held for the duration of one run.
///
/// Released on drop (RAII).
///
/// # Example
///
/// ```ignore
/// let lock = RunLock::for_sync("chain")?;
/// // Lock is held until `lock` goes out of scope
/// ```
pub struct RunLock {
    /// The lock file handle (kept open to maintain lock)
    file: File,
    /// Path to the lock file
    path: PathBuf,
    /// PID of this process
    pid: u32,
}

impl RunLock {
    /// Lock guarding sync passes over database `db_name`.
    pub fn for_sync(db_name: &str) -> Result<Self, LockError> {
        Self::acquire(&Self::default_path("sync", db_name))
    }

    /// Lock guarding rich-list passes over database `db_name`.
    pub fn for_rich_list(db_name: &str) -> Result<Self, LockError> {
        Self::acquire(&Self::default_path("richlist", db_name))
    }

    /// Lock guarding ENS sync passes over database `db_name`.
    pub fn for_ens_sync(db_name: &str) -> Result<Self, LockError> {
        Self::acquire(&Self::default_path("enssync", db_name))
    }

    /// `<tmp>/ix-<job>-<db_name>.lock`
    pub fn default_path(job: &str, db_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ix-{}-{}.lock", job, db_name))
    }

    /// Try once to take the lock at `lock_path`.
    ///
    /// # Errors
    ///
    /// Returns `LockError::AlreadyLocked` if another run holds it.
    pub fn acquire(lock_path: &Path) -> Result<Self, LockError> {
        // Do not truncate before locking: the holder's PID must survive.
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(LockError::CreateFailed)?;

        if file.try_lock_exclusive().is_err() {
            let pid = Self::read_existing_pid(&mut file);
            debug!("[ix-03] Lock {} is held by {:?}", lock_path.display(), pid);
            return Err(LockError::AlreadyLocked {
                pid,
                path: lock_path.to_path_buf(),
            });
        }

        let pid = std::process::id();
        file.set_len(0).map_err(LockError::WriteFailed)?;
        file.seek(SeekFrom::Start(0))
            .map_err(LockError::WriteFailed)?;
        writeln!(file, "{}", pid).map_err(LockError::WriteFailed)?;
        file.sync_all().map_err(LockError::WriteFailed)?;

        info!("[ix-03] 🔒 Acquired run lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path.to_path_buf(),
            pid,
        })
    }

    /// Get the PID of the process holding the lock
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the path to the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing_pid(file: &mut File) -> Option<u32> {
        let mut content = String::new();
        file.read_to_string(&mut content).ok()?;
        content.trim().parse().ok()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Remove before unlocking so a waiter never locks an unlinked file.
        let _ = std::fs::remove_file(&self.path);
        #[allow(clippy::incompatible_msrv)]
        let _ = self.file.unlock();
    }
}
