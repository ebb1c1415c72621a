//! Per-decision import audit trail (`import_audit.csv`).
//!
//! One row per importer decision. Value previews are truncated at 64
//! characters and columns whose name contains `CPR` are masked down to
//! their last two characters before anything reaches disk.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::db::SqlValue;
use crate::util::contains_ci;

const HEADER: &str =
    "Timestamp,File,Event,Element,Table,NewId,ParentTable,ParentId,FkColumn,Reason,Params";
const PREVIEW_MAX: usize = 64;

/// One audit row, minus the timestamp the writer adds
#[derive(Debug, Default, Clone)]
pub struct AuditEvent {
    pub file: String,
    pub event: &'static str,
    pub element: String,
    pub table: String,
    pub new_id: Option<i32>,
    pub parent_table: String,
    pub parent_id: Option<i32>,
    pub fk_column: String,
    pub reason: String,
    pub params: String,
}

pub struct AuditLog {
    path: PathBuf,
    mutex: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            mutex: Mutex::new(()),
        }
    }

    /// Append one event. Failures are swallowed.
    pub fn record(&self, event: &AuditEvent) {
        let _guard = self.mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = self.record_inner(event) {
            tracing::debug!(error = %err, "audit append failed");
        }
    }

    fn record_inner(&self, event: &AuditEvent) -> std::io::Result<()> {
        let new_file = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if new_file {
            writeln!(file, "{}", HEADER)?;
        }
        let fields = [
            Utc::now().to_rfc3339(),
            event.file.clone(),
            event.event.to_string(),
            event.element.clone(),
            event.table.clone(),
            event.new_id.map(|i| i.to_string()).unwrap_or_default(),
            event.parent_table.clone(),
            event.parent_id.map(|i| i.to_string()).unwrap_or_default(),
            event.fk_column.clone(),
            event.reason.clone(),
            event.params.clone(),
        ];
        let row = fields
            .iter()
            .map(|f| csv_field(f))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(file, "{}", row)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a `name=value; …` preview of bound parameters for the audit trail
pub fn format_params(values: &[(String, SqlValue)]) -> String {
    values
        .iter()
        .map(|(name, value)| format!("{}={}", name, preview_value(name, value)))
        .collect::<Vec<_>>()
        .join("; ")
}

fn preview_value(column: &str, value: &SqlValue) -> String {
    let text = match value {
        SqlValue::Text(s) => s.clone(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Null => "NULL".to_string(),
    };
    let text = if contains_ci(column, "CPR") {
        mask_tail(&text)
    } else {
        text
    };
    if text.chars().count() > PREVIEW_MAX {
        let truncated: String = text.chars().take(PREVIEW_MAX).collect();
        format!("{}…", truncated)
    } else {
        text
    }
}

/// Keep only the last two characters of a sensitive value
fn mask_tail(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 2 {
        return value.to_string();
    }
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import_audit.csv");
        let log = AuditLog::new(&path);
        log.record(&AuditEvent {
            file: "a.xml".to_string(),
            event: "insert",
            element: "Item".to_string(),
            table: "RootItem".to_string(),
            new_id: Some(1),
            ..Default::default()
        });
        log.record(&AuditEvent {
            file: "a.xml".to_string(),
            event: "skip-no-table",
            element: "Other".to_string(),
            ..Default::default()
        });
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].contains("insert"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_params_preview_truncates() {
        let long = "x".repeat(100);
        let preview = format_params(&[("Code".to_string(), SqlValue::Text(long))]);
        assert!(preview.starts_with("Code="));
        assert!(preview.chars().count() <= "Code=".chars().count() + PREVIEW_MAX + 1);
    }

    #[test]
    fn test_cpr_columns_masked() {
        let preview = format_params(&[(
            "ParentCprNumber".to_string(),
            SqlValue::Text("0101701234".to_string()),
        )]);
        assert_eq!(preview, "ParentCprNumber=***34");
    }
}
