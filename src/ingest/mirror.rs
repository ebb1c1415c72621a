//! Remote mirror: poll a remote directory and copy unseen `*.xml` files
//! into the ingest directory, deduplicating through a persisted history.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observe::Observer;
use crate::util::ends_with_ci;

/// Polling faster than this hammers remote shares for no benefit
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct RemoteMirror {
    remote_dir: PathBuf,
    ingest_dir: PathBuf,
    history_path: PathBuf,
    observer: Arc<Observer>,
    /// Lowercased filenames already mirrored; mutated only by the poll owner
    seen: Mutex<HashSet<String>>,
    copying: AtomicBool,
}

impl RemoteMirror {
    /// Load the history file and seed the seen-set with files already in
    /// the ingest, imported, and error directories, so a lost history file
    /// does not cause a re-copy storm.
    pub fn new(
        remote_dir: &Path,
        ingest_dir: &Path,
        history_path: &Path,
        observer: Arc<Observer>,
    ) -> Self {
        let mut seen = HashSet::new();

        if let Ok(history) = std::fs::read_to_string(history_path) {
            for line in history.lines() {
                let name = line.trim();
                if !name.is_empty() {
                    seen.insert(name.to_ascii_lowercase());
                }
            }
        }

        let root = ingest_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| ingest_dir.to_path_buf());
        for dir in [
            ingest_dir.to_path_buf(),
            root.join("imported"),
            root.join("error"),
        ] {
            if let Ok(entries) = std::fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    seen.insert(entry.file_name().to_string_lossy().to_ascii_lowercase());
                }
            }
        }

        Self {
            remote_dir: remote_dir.to_path_buf(),
            ingest_dir: ingest_dir.to_path_buf(),
            history_path: history_path.to_path_buf(),
            observer,
            seen: Mutex::new(seen),
            copying: AtomicBool::new(false),
        }
    }

    /// One copy pass; returns how many files were copied. Contenders exit
    /// immediately under the single-owner guard.
    pub fn copy_pass(&self) -> usize {
        if self
            .copying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("copy pass already running, skipping");
            return 0;
        }
        let _release = ClearOnDrop(&self.copying);

        let entries = match std::fs::read_dir(&self.remote_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %self.remote_dir.display(), error = %err, "remote directory unavailable");
                return 0;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| ends_with_ci(&p.to_string_lossy(), ".xml"))
            .collect();
        files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

        let mut copied = 0;
        for file in files {
            let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let key = name.to_ascii_lowercase();
            if self.seen.lock().expect("seen lock").contains(&key) {
                continue;
            }

            let destination = self.destination_for(&name);
            match std::fs::copy(&file, &destination) {
                Ok(_) => {
                    self.append_history(&name);
                    self.seen.lock().expect("seen lock").insert(key);
                    self.observer.record_remote_copy(&name);
                    copied += 1;
                }
                // Not recorded as seen; the next tick retries.
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "remote copy failed");
                }
            }
        }

        if copied > 0 {
            info!(copied, "mirrored files from remote source");
        }
        copied
    }

    /// Local destination; name collisions get a timestamp suffix on the stem
    fn destination_for(&self, name: &str) -> PathBuf {
        let destination = self.ingest_dir.join(name);
        if !destination.exists() {
            return destination;
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.ingest_dir
            .join(format!("{}_{}{}", stem, stamp, extension))
    }

    fn append_history(&self, name: &str) {
        use std::io::Write;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .and_then(|mut f| writeln!(f, "{}", name));
        if let Err(err) = result {
            warn!(error = %err, "history append failed");
        }
    }

    /// Backlog pass at startup, then poll on the configured cadence. Any
    /// pass that copied something triggers an ingest batch.
    pub async fn run(
        &self,
        token: CancellationToken,
        poll: Duration,
        trigger: mpsc::UnboundedSender<()>,
    ) {
        let poll = poll.max(MIN_POLL_INTERVAL);

        if self.copy_pass() > 0 {
            let _ = trigger.send(());
        }

        let mut ticker = tokio::time::interval(poll);
        ticker.tick().await; // immediate first tick already covered by the backlog pass
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    if self.copy_pass() > 0 {
                        let _ = trigger.send(());
                    }
                }
            }
        }
    }
}

struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer(dir: &Path) -> Arc<Observer> {
        Arc::new(Observer::configure(dir, false))
    }

    fn layout() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote");
        let ingest = dir.path().join("in");
        let history = dir.path().join("out").join("remote_copied_files.txt");
        std::fs::create_dir_all(&remote).unwrap();
        std::fs::create_dir_all(&ingest).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        (dir, remote, ingest, history)
    }

    #[test]
    fn test_backlog_copies_and_records_history() {
        let (dir, remote, ingest, history) = layout();
        std::fs::write(remote.join("a.xml"), "<Root/>").unwrap();
        std::fs::write(remote.join("b.xml"), "<Root/>").unwrap();
        std::fs::write(remote.join("notes.txt"), "ignored").unwrap();

        let mirror = RemoteMirror::new(&remote, &ingest, &history, observer(dir.path()));
        assert_eq!(mirror.copy_pass(), 2);
        assert!(ingest.join("a.xml").exists());
        assert!(ingest.join("b.xml").exists());
        assert!(!ingest.join("notes.txt").exists());

        let recorded = std::fs::read_to_string(&history).unwrap();
        assert!(recorded.contains("a.xml"));
        assert!(recorded.contains("b.xml"));

        // Second pass in the same process copies nothing.
        assert_eq!(mirror.copy_pass(), 0);
    }

    #[test]
    fn test_history_survives_restart() {
        let (dir, remote, ingest, history) = layout();
        std::fs::write(remote.join("a.xml"), "<Root/>").unwrap();

        let first = RemoteMirror::new(&remote, &ingest, &history, observer(dir.path()));
        assert_eq!(first.copy_pass(), 1);
        std::fs::remove_file(ingest.join("a.xml")).unwrap();

        // A fresh mirror (new process) still skips the recorded file.
        let second = RemoteMirror::new(&remote, &ingest, &history, observer(dir.path()));
        assert_eq!(second.copy_pass(), 0);
    }

    #[test]
    fn test_local_files_seed_seen_set_after_history_loss() {
        let (dir, remote, ingest, history) = layout();
        std::fs::write(remote.join("a.xml"), "<Root/>").unwrap();
        // Already imported in a previous life, history lost.
        let imported = dir.path().join("imported");
        std::fs::create_dir_all(&imported).unwrap();
        std::fs::write(imported.join("a.xml"), "<Root/>").unwrap();

        let mirror = RemoteMirror::new(&remote, &ingest, &history, observer(dir.path()));
        assert_eq!(mirror.copy_pass(), 0);
    }

    #[test]
    fn test_name_collision_gets_timestamp_suffix() {
        let (dir, remote, ingest, history) = layout();
        std::fs::write(remote.join("a.xml"), "<Root/>").unwrap();
        std::fs::write(ingest.join("a.xml"), "<Old/>").unwrap();

        let colliding = RemoteMirror::new(&remote, &ingest, &history, observer(dir.path()));
        let fresh = colliding.destination_for("b.xml");
        assert_eq!(fresh, ingest.join("b.xml"));
        let suffixed = colliding.destination_for("a.xml");
        let name = suffixed.file_name().unwrap().to_string_lossy().into_owned();
        assert_ne!(name, "a.xml");
        assert!(name.starts_with("a_"));
        assert!(name.ends_with(".xml"));
    }
}
