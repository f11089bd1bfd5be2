//! Advisory, per-workflow exclusive lock over a workflow's checkpoint directory.
//!
//! Prevents two processes from concurrently resuming or advancing the same
//! `workflow_id`. The same "no in-flight executions" discipline the tool
//! registry requires for deregistration applied one level up, to a whole
//! workflow rather than a single adapter. Advisory only: it
//! coordinates cooperating `scanforge` processes and is not a security
//! boundary.

use camino::Utf8PathBuf;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub created_at: u64,
    pub workflow_id: String,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("workflow '{workflow_id}' is already running (pid {pid}, acquired {created_ago} ago)")]
    ConcurrentExecution {
        workflow_id: String,
        pid: u32,
        created_ago: String,
    },
    #[error("stale lock for workflow '{workflow_id}' (pid {pid}, age {age_secs}s); pass force=true to override")]
    StaleLock {
        workflow_id: String,
        pid: u32,
        age_secs: u64,
    },
    #[error("lock file for workflow '{workflow_id}' is corrupted: {reason}")]
    Corrupted { workflow_id: String, reason: String },
    #[error("failed to acquire lock for workflow '{workflow_id}': {reason}")]
    AcquisitionFailed { workflow_id: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Holds the lock for `workflow_id` until dropped; the lock file is removed on drop.
pub struct WorkflowLock {
    lock_path: PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl WorkflowLock {
    /// Acquire the lock, retrying past a stale holder once.
    pub fn acquire(
        checkpoint_dir: &Utf8PathBuf,
        workflow_id: &str,
        force: bool,
        ttl_seconds: Option<u64>,
    ) -> Result<Self, LockError> {
        fs::create_dir_all(checkpoint_dir.as_std_path())?;
        let lock_path = checkpoint_dir.as_std_path().join(".lock");
        let ttl = ttl_seconds.unwrap_or(DEFAULT_STALE_THRESHOLD_SECS);

        for attempt in 0..2 {
            let info = LockInfo {
                pid: process::id(),
                created_at: now_secs(),
                workflow_id: workflow_id.to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(file) => return Self::finalize(lock_path, file, info),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing(&lock_path, workflow_id, force, ttl)?;
                    if attempt == 0 {
                        let _ = fs::remove_file(&lock_path);
                        continue;
                    }
                    return Err(LockError::AcquisitionFailed {
                        workflow_id: workflow_id.to_string(),
                        reason: "lock re-acquired by another process".to_string(),
                    });
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        workflow_id: workflow_id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            workflow_id: workflow_id.to_string(),
            reason: "exhausted retries".to_string(),
        })
    }

    fn finalize(
        lock_path: PathBuf,
        file: fs::File,
        info: LockInfo,
    ) -> Result<Self, LockError> {
        let json = serde_json::to_string_pretty(&info).map_err(|e| LockError::AcquisitionFailed {
            workflow_id: info.workflow_id.clone(),
            reason: e.to_string(),
        })?;
        let mut rw = Box::new(RwLock::new(file));
        {
            use std::io::Write;
            let mut guard = rw.try_write().map_err(|_| LockError::ConcurrentExecution {
                workflow_id: info.workflow_id.clone(),
                pid: info.pid,
                created_ago: "unknown".to_string(),
            })?;
            guard.write_all(json.as_bytes())?;
            guard.flush()?;
        }
        Ok(Self {
            lock_path,
            _fd_lock: Some(rw),
            info,
        })
    }

    /// Returns `Ok(())` if the existing lock is stale/overridable, `Err` otherwise.
    fn check_existing(
        lock_path: &Path,
        workflow_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        let content = match fs::read_to_string(lock_path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let existing: LockInfo = serde_json::from_str(&content).map_err(|e| LockError::Corrupted {
            workflow_id: workflow_id.to_string(),
            reason: e.to_string(),
        })?;

        let age = now_secs().saturating_sub(existing.created_at);
        let running = process_is_running(existing.pid);

        if running && !force {
            return Err(LockError::ConcurrentExecution {
                workflow_id: workflow_id.to_string(),
                pid: existing.pid,
                created_ago: format_duration(age),
            });
        }
        if !running && age <= ttl_seconds && !force {
            return Err(LockError::StaleLock {
                workflow_id: workflow_id.to_string(),
                pid: existing.pid,
                age_secs: age,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.info.workflow_id
    }
}

impl Drop for WorkflowLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

#[cfg(unix)]
fn process_is_running(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as i32, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_is_running(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir() -> (TempDir, Utf8PathBuf) {
        let td = TempDir::new().unwrap();
        let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
        (td, p)
    }

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let (_td, dir) = dir();
        let lock = WorkflowLock::acquire(&dir, "wf-1", false, None).unwrap();
        assert_eq!(lock.workflow_id(), "wf-1");
        drop(lock);
        let _lock2 = WorkflowLock::acquire(&dir, "wf-1", false, None).unwrap();
    }

    #[test]
    fn concurrent_acquire_fails() {
        let (_td, dir) = dir();
        let _lock = WorkflowLock::acquire(&dir, "wf-2", false, None).unwrap();
        let result = WorkflowLock::acquire(&dir, "wf-2", false, None);
        assert!(result.is_err());
    }

    #[test]
    fn stale_lock_is_overridable_with_force() {
        let (_td, dir) = dir();
        fs::create_dir_all(dir.as_std_path()).unwrap();
        let lock_path = dir.as_std_path().join(".lock");
        let stale = LockInfo {
            pid: 999_999,
            created_at: 0,
            workflow_id: "wf-3".to_string(),
        };
        fs::write(&lock_path, serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(WorkflowLock::acquire(&dir, "wf-3", false, None).is_err());
        let lock = WorkflowLock::acquire(&dir, "wf-3", true, None).unwrap();
        assert_eq!(lock.workflow_id(), "wf-3");
    }
}
