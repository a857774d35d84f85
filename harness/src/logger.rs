use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LOG_FILE_NAME: &str = "test-execution.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Success,
    Error,
    Metric,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Error => "ERROR",
            Level::Metric => "METRIC",
        };
        f.write_str(s)
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub test_case: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl LogEntry {
    fn now(level: Level, test_case: &str, action: &str) -> Self {
        LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            test_case: test_case.to_string(),
            action: action.to_string(),
            details: None,
            value: None,
        }
    }
}

/// Append-only JSON-lines log of a run, mirrored to the console.
///
/// Writes are serialized through one lock so lines never interleave. A
/// failed write is reported through `log` and counted, it never reaches the
/// caller.
pub struct RunLogger {
    path: PathBuf,
    file: Mutex<Option<File>>,
    write_failures: AtomicU64,
}

impl RunLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self::at(log_dir.as_ref().join(LOG_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        RunLogger {
            path: path.into(),
            file: Mutex::new(None),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn info(&self, test_case: &str, action: &str, details: Value) {
        self.event(Level::Info, test_case, action, details);
    }

    pub fn success(&self, test_case: &str, action: &str, details: Value) {
        self.event(Level::Success, test_case, action, details);
    }

    pub fn error(&self, test_case: &str, action: &str, details: Value) {
        self.event(Level::Error, test_case, action, details);
    }

    pub fn metric(&self, test_case: &str, metric_name: &str, value: impl Into<Value>) {
        let mut entry = LogEntry::now(Level::Metric, test_case, metric_name);
        let value = value.into();
        log::info!("[{}] {} - {} {}", entry.level, test_case, metric_name, value);
        entry.value = Some(value);
        self.write(&entry);
    }

    fn event(&self, level: Level, test_case: &str, action: &str, details: Value) {
        match level {
            Level::Error => log::error!("[{}] {} - {} {}", level, test_case, action, details),
            _ => log::info!("[{}] {} - {} {}", level, test_case, action, details),
        }
        let mut entry = LogEntry::now(level, test_case, action);
        entry.details = Some(details);
        self.write(&entry);
    }

    fn write(&self, entry: &LogEntry) {
        if let Err(e) = self.append(entry) {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            log::error!("could not append to {}: {e:#}", self.path.display());
        }
    }

    fn append(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut guard = self.file.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(file);
        }

        let written = match guard.as_mut() {
            Some(file) => file.write_all(&line),
            None => return Ok(()),
        };
        if written.is_err() {
            // reopen on the next call
            *guard = None;
        }
        Ok(written?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Level, LogEntry, RunLogger, LOG_FILE_NAME};

    fn read_entries(logger: &RunLogger) -> Vec<LogEntry> {
        std::fs::read_to_string(logger.path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_lines_are_appended_in_call_order() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = RunLogger::new(tmp.path().join("logs"));

        logger.info("TC-SETUP", "FETCH_TOKEN", json!({}));
        logger.success("TC-001", "REQUEST_SUCCESS", json!({"status": 200}));
        logger.error("TC-002", "ERROR", json!({"status": 404, "message": "Not found"}));
        logger.metric("TC-001", "responseTime_ms", 123);

        assert_eq!(
            logger.path(),
            tmp.path().join("logs").join(LOG_FILE_NAME)
        );
        let entries = read_entries(&logger);
        let levels: Vec<_> = entries.iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![Level::Info, Level::Success, Level::Error, Level::Metric]
        );
        assert_eq!(entries[1].details, Some(json!({"status": 200})));
        assert_eq!(entries[3].action, "responseTime_ms");
        assert_eq!(entries[3].value, Some(json!(123)));
        assert_eq!(entries[3].details, None);
        assert_eq!(logger.write_failures(), 0);
    }

    #[test]
    fn test_existing_log_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let first = RunLogger::new(tmp.path());
        first.info("TC-1", "A", json!({}));
        drop(first);

        let second = RunLogger::new(tmp.path());
        second.info("TC-2", "B", json!({}));

        let entries = read_entries(&second);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].test_case, "TC-1");
    }

    #[test]
    fn test_on_disk_field_names() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = RunLogger::new(tmp.path());
        logger.metric("ST-009", "responseTime_ms", 88);

        let raw = std::fs::read_to_string(logger.path()).unwrap();
        let line: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(line["testCase"], "ST-009");
        assert_eq!(line["level"], "METRIC");
        assert!(line["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(line.get("details").is_none());
    }

    #[test]
    fn test_write_failure_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        // a directory where the file should be makes every open fail
        let blocked = tmp.path().join(LOG_FILE_NAME);
        std::fs::create_dir(&blocked).unwrap();

        let logger = RunLogger::new(tmp.path());
        logger.info("TC-1", "A", json!({}));
        logger.error("TC-1", "B", json!({}));
        assert_eq!(logger.write_failures(), 2);
    }
}
