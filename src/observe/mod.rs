//! Observability sink: rolling import log, JSONL event stream, rolling
//! stats document, and the optional per-decision audit trail.
//!
//! All writers swallow their own failures; recording an outcome must never
//! take the ingest loop down with it.

mod audit;
mod rolling;

pub use audit::{format_params, AuditEvent, AuditLog};
pub use rolling::{RollingLog, DEFAULT_MAX_BYTES};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One line of `observability.jsonl`
#[derive(Debug, Serialize)]
struct FileEvent<'a> {
    ts: String,
    #[serde(rename = "type")]
    kind: &'static str,
    file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "totalRows")]
    total_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "durationMs")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "perTable")]
    per_table: Option<&'a BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Rolling totals in `observability.stats.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ObservabilityStats {
    #[serde(rename = "totalFiles", default)]
    pub total_files: u64,
    #[serde(rename = "successFiles", default)]
    pub success_files: u64,
    #[serde(rename = "failedFiles", default)]
    pub failed_files: u64,
    #[serde(rename = "totalRows", default)]
    pub total_rows: u64,
    #[serde(rename = "perTable", default)]
    pub per_table: BTreeMap<String, u64>,
    #[serde(rename = "lastSuccessAt", skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<String>,
    #[serde(rename = "lastFailureAt", skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<String>,
}

pub struct Observer {
    events_path: PathBuf,
    stats_path: PathBuf,
    stats_lock: Mutex<()>,
    log: RollingLog,
    audit: Option<AuditLog>,
}

impl Observer {
    /// Wire the sink up under `out_dir`
    pub fn configure(out_dir: &Path, audit_enabled: bool) -> Self {
        let audit = audit_enabled.then(|| AuditLog::new(&out_dir.join("import_audit.csv")));
        Self {
            events_path: out_dir.join("observability.jsonl"),
            stats_path: out_dir.join("observability.stats.json"),
            stats_lock: Mutex::new(()),
            log: RollingLog::new(&out_dir.join("import.log"), DEFAULT_MAX_BYTES),
            audit,
        }
    }

    pub fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Append a line to the rolling import log
    pub fn log(&self, line: &str) {
        self.log.append(line);
    }

    pub fn record_success(
        &self,
        file: &str,
        total_rows: u64,
        duration_ms: u64,
        per_table: &BTreeMap<String, u64>,
    ) {
        self.append_event(&FileEvent {
            ts: Utc::now().to_rfc3339(),
            kind: "file-success",
            file,
            total_rows: Some(total_rows),
            duration_ms: Some(duration_ms),
            per_table: Some(per_table),
            error: None,
        });
        self.update_stats(|stats| {
            stats.total_files += 1;
            stats.success_files += 1;
            stats.total_rows += total_rows;
            for (table, rows) in per_table {
                *stats.per_table.entry(table.clone()).or_default() += rows;
            }
            stats.last_success_at = Some(Utc::now().to_rfc3339());
        });
        self.log(&format!(
            "imported {} ({} rows in {} ms)",
            file, total_rows, duration_ms
        ));
    }

    pub fn record_failure(&self, file: &str, error: &str, duration_ms: u64) {
        self.append_event(&FileEvent {
            ts: Utc::now().to_rfc3339(),
            kind: "file-failure",
            file,
            total_rows: None,
            duration_ms: Some(duration_ms),
            per_table: None,
            error: Some(error),
        });
        self.update_stats(|stats| {
            stats.total_files += 1;
            stats.failed_files += 1;
            stats.last_failure_at = Some(Utc::now().to_rfc3339());
        });
        self.log(&format!("failed {}: {}", file, error));
    }

    pub fn record_remote_copy(&self, file: &str) {
        self.log(&format!("copied {} from remote source", file));
    }

    /// Current stats snapshot (missing or corrupt file reads as zeroes)
    pub fn stats(&self) -> ObservabilityStats {
        let _guard = self.stats_lock.lock().unwrap_or_else(|p| p.into_inner());
        Self::read_stats(&self.stats_path)
    }

    fn append_event(&self, event: &FileEvent) {
        let result = serde_json::to_string(event).map(|line| {
            use std::io::Write;
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.events_path)
                .and_then(|mut f| writeln!(f, "{}", line))
        });
        if let Ok(Err(err)) = result {
            tracing::debug!(error = %err, "event append failed");
        }
    }

    fn update_stats(&self, apply: impl FnOnce(&mut ObservabilityStats)) {
        let _guard = self.stats_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut stats = Self::read_stats(&self.stats_path);
        apply(&mut stats);
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&self.stats_path, json) {
                    tracing::debug!(error = %err, "stats write failed");
                }
            }
            Err(err) => tracing::debug!(error = %err, "stats serialize failed"),
        }
    }

    fn read_stats(path: &Path) -> ObservabilityStats {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}
