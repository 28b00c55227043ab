//! Advisory per-project locking
//!
//! Every command that mutates a project's persisted state takes an exclusive
//! lock on the project directory first. That keeps a project single-writer
//! across processes: two CLI invocations cannot interleave their
//! read-modify-write cycles on `state.json`.
//!
//! The lock is advisory. It coordinates stagehand processes, it is not a
//! security boundary.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default age after which an abandoned lock is considered stale (15 minutes)
pub const DEFAULT_LOCK_TTL_SECS: u64 = 900;

const LOCK_FILE_NAME: &str = "project.lock";

/// Lock information stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that created the lock
    pub pid: u32,
    /// Seconds since UNIX epoch when the lock was created
    pub created_at: u64,
    /// Project being locked
    pub project_id: String,
    /// stagehand version that created the lock
    pub version: String,
}

/// Errors raised while acquiring or releasing a project lock
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Project '{project_id}' is locked by PID {pid} (created {age_secs}s ago)")]
    ConcurrentExecution {
        project_id: String,
        pid: u32,
        age_secs: u64,
    },

    #[error(
        "Stale lock detected for project '{project_id}' (PID {pid}, age {age_secs}s). Use --force to override"
    )]
    StaleLock {
        project_id: String,
        pid: u32,
        age_secs: u64,
    },

    #[error("Lock file is corrupted or invalid: {reason}")]
    CorruptedLock { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive lock on one project directory, released on drop.
pub struct ProjectLock {
    lock_path: Utf8PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl std::fmt::Debug for ProjectLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectLock")
            .field("lock_path", &self.lock_path)
            .field("info", &self.info)
            .finish()
    }
}

impl ProjectLock {
    /// Acquire the lock for `project_id` inside `project_dir`.
    ///
    /// # Arguments
    /// * `project_dir` - The project's state directory (created if missing)
    /// * `project_id` - Used in lock info and error messages
    /// * `force` - Override an existing lock regardless of age
    /// * `ttl_seconds` - Age after which an existing lock is stale
    pub fn acquire(
        project_dir: &Utf8Path,
        project_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<Self, LockError> {
        fs::create_dir_all(project_dir).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to create project directory {project_dir}: {e}"),
        })?;

        let lock_path = project_dir.join(LOCK_FILE_NAME);

        // Two attempts: the second runs after removing a stale/forced lock.
        for _ in 0..2 {
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(file) => return Self::finalize(lock_path, file, project_id),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing(&lock_path, project_id, force, ttl_seconds)?;
                    match fs::remove_file(&lock_path) {
                        Ok(()) => continue,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(LockError::Io(e)),
                    }
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!("Failed to create lock file {lock_path}: {e}"),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!("Another process acquired the lock for project '{project_id}'"),
        })
    }

    /// Information recorded for this lock.
    #[must_use]
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.lock_path
    }

    fn finalize(lock_path: Utf8PathBuf, file: fs::File, project_id: &str) -> Result<Self, LockError> {
        let info = LockInfo {
            pid: process::id(),
            created_at: now_secs(),
            project_id: project_id.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let json = serde_json::to_string_pretty(&info).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to serialize lock info: {e}"),
        })?;

        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let guard = rw_lock
                .try_write()
                .map_err(|_| LockError::ConcurrentExecution {
                    project_id: project_id.to_string(),
                    pid: 0,
                    age_secs: 0,
                })?;
            let mut file_ref = &*guard;
            file_ref.write_all(json.as_bytes())?;
            file_ref.flush()?;
            file_ref.sync_all()?;
        }

        Ok(Self {
            lock_path,
            _fd_lock: Some(rw_lock),
            info,
        })
    }

    fn check_existing(
        lock_path: &Utf8Path,
        project_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        if force {
            return Ok(());
        }

        let content = match fs::read_to_string(lock_path) {
            Ok(content) => content,
            // Released between our create attempt and the read
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LockError::Io(e)),
        };

        let existing: LockInfo =
            serde_json::from_str(&content).map_err(|e| LockError::CorruptedLock {
                reason: format!("{lock_path}: {e}"),
            })?;

        let age_secs = now_secs().saturating_sub(existing.created_at);
        if age_secs > ttl_seconds {
            Err(LockError::StaleLock {
                project_id: project_id.to_string(),
                pid: existing.pid,
                age_secs,
            })
        } else {
            Err(LockError::ConcurrentExecution {
                project_id: project_id.to_string(),
                pid: existing.pid,
                age_secs,
            })
        }
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        if self.lock_path.exists() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
