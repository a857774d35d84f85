//! Offline rendering of run logs into a single HTML table.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::ReportError;

pub const REPORT_FILE_NAME: &str = "report.html";
const LOG_EXTENSIONS: [&str; 2] = ["json", "log"];

/// Display form of one parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub timestamp: String,
    pub test_case: String,
    pub level: String,
    pub action: String,
    pub details: String,
}

impl ReportRow {
    /// Parses one log line. Anything that is not a JSON object yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let entry = value.as_object()?;

        let text = |key: &str| match entry.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let details = entry
            .get("details")
            .or_else(|| entry.get("value"))
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".to_string());
        let action = match text("action") {
            a if a.is_empty() => text("message"),
            a => a,
        };

        Some(ReportRow {
            timestamp: text("timestamp"),
            test_case: text("testCase"),
            level: text("level"),
            action,
            details,
        })
    }
}

/// Parses every line of `content`, skipping the ones that do not parse.
pub fn parse_lines(content: &str) -> Vec<ReportRow> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(ReportRow::parse)
        .collect()
}

/// Log files in `log_dir`, sorted by name.
pub fn log_files(log_dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    if !log_dir.is_dir() {
        return Err(ReportError::MissingLogDir(log_dir.to_path_buf()));
    }
    let read_dir = fs::read_dir(log_dir).map_err(|source| ReportError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for dir_entry in read_dir {
        let path = dir_entry
            .map_err(|source| ReportError::Io {
                path: log_dir.to_path_buf(),
                source,
            })?
            .path();
        let recognised = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| LOG_EXTENSIONS.contains(&e));
        if recognised && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ReportError::NoLogFiles(log_dir.to_path_buf()));
    }
    Ok(files)
}

pub fn collect_rows(log_dir: &Path) -> Result<Vec<ReportRow>, ReportError> {
    let mut rows = Vec::new();
    for path in log_files(log_dir)? {
        let bytes = fs::read(&path).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        // a write cut mid-character must only cost its own line
        rows.extend(parse_lines(&String::from_utf8_lossy(&bytes)));
    }
    Ok(rows)
}

pub fn render_html(rows: &[ReportRow]) -> String {
    let body = rows
        .iter()
        .map(|row| {
            format!(
                "      <tr>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n      </tr>",
                html_escape(&row.timestamp),
                html_escape(&row.test_case),
                html_escape(&row.level),
                html_escape(&row.action),
                html_escape(&row.details),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Contract Run Log Report</title>
  <style>
    body {{ font-family: Arial, sans-serif; padding: 20px; }}
    table {{ width: 100%; border-collapse: collapse; }}
    th, td {{ border: 1px solid #ccc; padding: 8px; text-align: left; }}
    th {{ background: #eee; }}
  </style>
</head>
<body>
  <h1>Contract Run Log Report</h1>
  <p>{count} entries</p>
  <table>
    <thead>
      <tr>
        <th>Timestamp</th>
        <th>Test Case</th>
        <th>Level</th>
        <th>Action</th>
        <th>Details</th>
      </tr>
    </thead>
    <tbody>
{body}
    </tbody>
  </table>
</body>
</html>
"#,
        count = rows.len(),
        body = body,
    )
}

/// Reads every log in `log_dir` and overwrites `output` with the rendered
/// report. Returns the number of rows written.
pub fn generate(log_dir: &Path, output: &Path) -> Result<usize, ReportError> {
    let rows = collect_rows(log_dir)?;
    fs::write(output, render_html(&rows)).map_err(|source| ReportError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(rows.len())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
