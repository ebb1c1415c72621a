//! Ingest loop: batch directory scans driven by filesystem events through a
//! restartable debounce window, with a single-owner reentrancy guard.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::SqlConnector;
use crate::import::Importer;
use crate::ingest::ready::wait_until_ready;
use crate::observe::Observer;
use crate::util::ends_with_ci;

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Directory scanned for `*.xml` (non-recursive)
    pub ingest_dir: PathBuf,
    /// Quiet window after the last filesystem event before a batch runs
    pub debounce: Duration,
    /// Longest wait for the per-file ready gate
    pub ready_wait: Duration,
}

pub struct IngestRunner {
    options: RunnerOptions,
    importer: Importer,
    connector: Arc<dyn SqlConnector>,
    observer: Arc<Observer>,
    imported_dir: PathBuf,
    error_dir: PathBuf,
    importing: AtomicBool,
}

impl IngestRunner {
    pub fn new(
        options: RunnerOptions,
        importer: Importer,
        connector: Arc<dyn SqlConnector>,
        observer: Arc<Observer>,
    ) -> Self {
        // imported/ and error/ live beside the ingest dir.
        let root = options
            .ingest_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| options.ingest_dir.clone());
        let imported_dir = root.join("imported");
        let error_dir = root.join("error");
        let _ = std::fs::create_dir_all(&options.ingest_dir);
        let _ = std::fs::create_dir_all(&imported_dir);
        let _ = std::fs::create_dir_all(&error_dir);
        Self {
            imported_dir,
            error_dir,
            options,
            importer,
            connector,
            observer,
            importing: AtomicBool::new(false),
        }
    }

    /// Run one batch over the ingest directory. Contenders return
    /// immediately; the event that queued them re-triggers a batch later.
    pub async fn run_batch(&self, token: &CancellationToken) {
        if self
            .importing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("batch already running, skipping");
            return;
        }
        let _release = ClearOnDrop(&self.importing);

        let files = self.scan_ingest_dir();
        if files.is_empty() {
            return;
        }
        info!(count = files.len(), "starting ingest batch");

        for file in files {
            if token.is_cancelled() {
                return;
            }
            self.process_file(&file).await;
        }
    }

    /// `*.xml` files in the ingest directory, lexicographic by name
    fn scan_ingest_dir(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.options.ingest_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %self.options.ingest_dir.display(), error = %err, "ingest dir scan failed");
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| ends_with_ci(&p.to_string_lossy(), ".xml"))
            .collect();
        files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
        files
    }

    async fn process_file(&self, path: &Path) {
        wait_until_ready(path, self.options.ready_wait).await;

        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let started = Instant::now();

        let result = async {
            let mut session = self.connector.connect().await?;
            self.importer.import_file(session.as_mut(), path).await
        }
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                self.observer
                    .record_success(&file, outcome.total, duration_ms, &outcome.per_table);
                move_file(path, &self.imported_dir);
            }
            Err(err) => {
                self.observer.record_failure(&file, &err.to_string(), duration_ms);
                move_file(path, &self.error_dir);
            }
        }
    }

    /// Watch the ingest directory and run a debounced batch per event
    /// burst; one batch runs immediately at startup. The trigger channel is
    /// shared: the remote mirror feeds copied-file events into the same
    /// debounce window the watcher uses.
    pub async fn run(
        &self,
        token: CancellationToken,
        trigger_tx: mpsc::UnboundedSender<()>,
        trigger_rx: mpsc::UnboundedReceiver<()>,
    ) {
        let _watcher = match self.spawn_watcher(trigger_tx) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %err, "filesystem watcher unavailable, relying on triggers");
                None
            }
        };

        self.run_batch(&token).await;
        self.event_loop(trigger_rx, token).await;
    }

    fn spawn_watcher(
        &self,
        tx: mpsc::UnboundedSender<()>,
    ) -> notify::Result<notify::RecommendedWatcher> {
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            if let Ok(event) = event {
                let relevant = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(notify::event::ModifyKind::Name(_))
                );
                if relevant {
                    let _ = tx.send(());
                }
            }
        })?;
        watcher.watch(&self.options.ingest_dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    /// Collapse event bursts: only the last event inside the debounce
    /// window triggers a batch.
    pub async fn event_loop(
        &self,
        mut rx: mpsc::UnboundedReceiver<()>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                event = rx.recv() => {
                    if event.is_none() {
                        return;
                    }
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => return,
                            _ = tokio::time::sleep(self.options.debounce) => break,
                            more = rx.recv() => {
                                if more.is_none() {
                                    break;
                                }
                                // Timer restarts: another event landed.
                            }
                        }
                    }
                    self.run_batch(&token).await;
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

/// Best-effort move with overwrite semantics
fn move_file(path: &Path, target_dir: &Path) {
    let Some(name) = path.file_name() else {
        return;
    };
    let target = target_dir.join(name);
    if target.exists() {
        let _ = std::fs::remove_file(&target);
    }
    if let Err(err) = std::fs::rename(path, &target) {
        warn!(from = %path.display(), to = %target.display(), error = %err, "move failed");
    }
}
