//! Size-capped rolling log file.
//!
//! Appends are serialized through an in-process mutex plus a cross-process
//! lock file keyed by the SHA-256 of the absolute log path. The lock is
//! acquired for at most 500 ms; on timeout the write proceeds unguarded
//! rather than deadlocking the ingest loop.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Local;
use sha2::{Digest, Sha256};

/// 2 MiB cap before rotation
pub const DEFAULT_MAX_BYTES: u64 = 2 * 1024 * 1024;

const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(500);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

pub struct RollingLog {
    path: PathBuf,
    lock_path: PathBuf,
    max_bytes: u64,
    mutex: Mutex<()>,
}

impl RollingLog {
    pub fn new(path: &Path, max_bytes: u64) -> Self {
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default().join(path));
        let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
        let lock_path =
            std::env::temp_dir().join(format!("xsd-ingest-{:x}.lock", digest));
        Self {
            path: path.to_path_buf(),
            lock_path,
            max_bytes,
            mutex: Mutex::new(()),
        }
    }

    /// Append one line, rotating first when the write would cross the cap.
    /// Failures are swallowed; logging must never poison the ingest loop.
    pub fn append(&self, line: &str) {
        let _guard = self.mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let cross = CrossProcessLock::acquire(&self.lock_path);

        let entry = format!("{} {}\n", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), line);
        if let Err(err) = self.append_inner(&entry) {
            tracing::debug!(error = %err, "log append failed");
        }
        drop(cross);
    }

    fn append_inner(&self, entry: &str) -> std::io::Result<()> {
        let current = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if current + entry.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }

    fn rotate(&self) -> std::io::Result<()> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%3f");
        let pid = std::process::id();
        let nonce = Local::now()
            .timestamp_subsec_nanos()
            .wrapping_mul(0x9e37) as u16;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import.log".to_string());
        let backup = self
            .path
            .with_file_name(format!("{}.{}.{}.{:04x}", file_name, stamp, pid, nonce));
        std::fs::rename(&self.path, backup)
    }
}

/// Best-effort lock file shared between processes writing the same log
struct CrossProcessLock {
    path: Option<PathBuf>,
}

impl CrossProcessLock {
    fn acquire(path: &Path) -> Self {
        let deadline = Instant::now() + LOCK_ACQUIRE_TIMEOUT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Self {
                        path: Some(path.to_path_buf()),
                    }
                }
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                // Timed out: proceed unguarded instead of deadlocking.
                Err(_) => return Self { path: None },
            }
        }
    }
}

impl Drop for CrossProcessLock {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            let _ = std::fs::remove_file(path);
        }
    }
}
