use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::fixtures::{ApiConfig, ErrorCodes, Fixture, TestData, Validations};
use crate::metrics::success_rate;
use crate::request::HttpResponse;

pub const RUN_ENV_VAR: &str = "RUN_ENV";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionData {
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    pub metrics: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Snapshot of a run; skipped cases are not part of `total_tests`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[serde(flatten)]
    pub execution: ExecutionData,
    #[serde(rename = "totalTime")]
    pub total_time_ms: Option<u64>,
    pub total_tests: u64,
    pub success_rate: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub logs_dir: PathBuf,
    pub start_time: String,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseChecks {
    pub status_code: bool,
    pub content_type: bool,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseValidation {
    pub is_valid: bool,
    pub validations: ResponseChecks,
}

/// Mutable state of one contract run.
///
/// Owned by the run and passed explicitly to whatever needs it; nothing here
/// is global.
#[derive(Debug)]
pub struct TestRunContext {
    token: Option<String>,
    user_id: Option<String>,
    start_time: Option<Instant>,
    execution: ExecutionData,
    log_dir: PathBuf,
    test_data: TestData,
    api_config: ApiConfig,
    pub error_codes: ErrorCodes,
    pub validations: Validations,
}

impl TestRunContext {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        TestRunContext {
            token: None,
            user_id: None,
            start_time: None,
            execution: ExecutionData::default(),
            log_dir: log_dir.into(),
            test_data: TestData::default(),
            api_config: ApiConfig::default(),
            error_codes: ErrorCodes::default(),
            validations: Validations::default(),
        }
    }

    pub fn with_api_config(mut self, api_config: ApiConfig) -> Self {
        self.api_config = api_config;
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_token_set(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Starts, or restarts, the run clock.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        self.start_time
            .map(|start| start.elapsed().as_millis() as u64)
    }

    /// Last write wins for each `(test_case, metric_name)` pair.
    pub fn record_metric(&mut self, test_case: &str, metric_name: &str, value: f64) {
        self.execution
            .metrics
            .entry(test_case.to_string())
            .or_default()
            .insert(metric_name.to_string(), value);
    }

    pub fn metric(&self, test_case: &str, metric_name: &str) -> Option<f64> {
        self.execution
            .metrics
            .get(test_case)
            .and_then(|m| m.get(metric_name))
            .copied()
    }

    pub fn record_pass(&mut self) {
        self.execution.passed_tests += 1;
    }

    pub fn record_fail(&mut self) {
        self.execution.failed_tests += 1;
    }

    pub fn record_skip(&mut self) {
        self.execution.skipped_tests += 1;
    }

    pub fn summary(&self) -> RunSummary {
        let total_tests = self.execution.passed_tests + self.execution.failed_tests;
        RunSummary {
            execution: self.execution.clone(),
            total_time_ms: self.elapsed_ms(),
            total_tests,
            success_rate: success_rate(self.execution.passed_tests, total_tests),
        }
    }

    pub fn test_data(&self) -> &TestData {
        &self.test_data
    }

    /// Fixture table for `category`, `None` when the name is unknown.
    pub fn get_test_data(&self, category: &str) -> Option<Fixture<'_>> {
        self.test_data.category(category)
    }

    pub fn api_config(&self) -> &ApiConfig {
        &self.api_config
    }

    pub fn validate_http_response(
        &self,
        response: &HttpResponse,
        expected_status: StatusCode,
    ) -> ResponseValidation {
        let validations = ResponseChecks {
            status_code: response.status == expected_status,
            content_type: response
                .content_type()
                .is_some_and(|ct| ct.contains(self.validations.content_type_json)),
            has_data: has_data(&response.body),
        };
        ResponseValidation {
            is_valid: validations.status_code && validations.content_type && validations.has_data,
            validations,
        }
    }

    pub fn validate_ok(&self, response: &HttpResponse) -> ResponseValidation {
        self.validate_http_response(response, StatusCode::OK)
    }

    /// Creates the log directory and describes the environment of the run.
    pub fn setup_environment(&self) -> std::io::Result<EnvironmentInfo> {
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(EnvironmentInfo {
            logs_dir: self.log_dir.clone(),
            start_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            environment: std::env::var(RUN_ENV_VAR).unwrap_or_else(|_| "test".to_string()),
        })
    }

    pub fn reset(&mut self) {
        self.token = None;
        self.user_id = None;
        self.start_time = None;
        self.execution = ExecutionData::default();
    }
}

fn has_data(body: &[u8]) -> bool {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => !value.is_null(),
        Err(_) => !body.iter().all(u8::is_ascii_whitespace),
    }
}

#[cfg(test)]
mod tests {
    use hyper::{
        body::Bytes,
        header::{HeaderValue, CONTENT_TYPE},
        HeaderMap, StatusCode,
    };

    use super::TestRunContext;
    use crate::fixtures::Fixture;
    use crate::request::HttpResponse;

    fn response(status: u16, content_type: Option<&'static str>, body: &'static str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_counters_match_calls() {
        let mut ctx = TestRunContext::new("logs");
        for _ in 0..3 {
            ctx.record_pass();
        }
        ctx.record_fail();
        ctx.record_skip();
        ctx.record_skip();

        let summary = ctx.summary();
        assert_eq!(summary.execution.passed_tests, 3);
        assert_eq!(summary.execution.failed_tests, 1);
        assert_eq!(summary.execution.skipped_tests, 2);
        assert_eq!(summary.total_tests, 4);
        assert_eq!(summary.success_rate, "75.00%");
    }

    #[test]
    fn test_empty_run_reports_na_rate() {
        let mut ctx = TestRunContext::new("logs");
        ctx.record_skip();
        let summary = ctx.summary();
        assert_eq!(summary.total_tests, 0);
        assert_eq!(summary.success_rate, "N/A");
    }

    #[test]
    fn test_metric_last_write_wins() {
        let mut ctx = TestRunContext::new("logs");
        ctx.record_metric("TC-1", "responseTime_ms", 120.0);
        ctx.record_metric("TC-1", "responseTime_ms", 340.0);
        ctx.record_metric("TC-1", "items", 5.0);
        assert_eq!(ctx.metric("TC-1", "responseTime_ms"), Some(340.0));
        assert_eq!(ctx.summary().execution.metrics["TC-1"].len(), 2);
        assert_eq!(ctx.metric("TC-2", "responseTime_ms"), None);
    }

    #[test]
    fn test_reset_is_repeatable() {
        let mut ctx = TestRunContext::new("logs");
        ctx.start_timer();
        ctx.set_token("abc123");
        ctx.set_user_id("spotify");
        ctx.record_pass();
        ctx.record_fail();
        ctx.record_metric("TC-1", "responseTime_ms", 1.0);

        ctx.reset();
        ctx.reset();

        let summary = ctx.summary();
        assert_eq!(summary.execution, Default::default());
        assert_eq!(summary.total_time_ms, None);
        assert_eq!(summary.total_tests, 0);
        assert!(!ctx.is_token_set());
        assert_eq!(ctx.user_id(), None);
    }

    #[test]
    fn test_elapsed_requires_start() {
        let mut ctx = TestRunContext::new("logs");
        assert_eq!(ctx.elapsed_ms(), None);
        ctx.start_timer();
        assert!(ctx.elapsed_ms().is_some());
    }

    #[test]
    fn test_token_state() {
        let mut ctx = TestRunContext::new("logs");
        assert!(!ctx.is_token_set());
        ctx.set_token("");
        assert!(!ctx.is_token_set());
        ctx.set_token("abc123");
        assert!(ctx.is_token_set());
        assert_eq!(ctx.token(), Some("abc123"));
    }

    #[test]
    fn test_fixture_lookup() {
        let ctx = TestRunContext::new("logs");
        match ctx.get_test_data("albums") {
            Some(Fixture::Albums(albums)) => assert_eq!(albums.market, "US"),
            other => panic!("unexpected fixture: {other:?}"),
        }
        assert!(ctx.get_test_data("podcasts").is_none());
        let json = serde_json::to_value(ctx.get_test_data("artists").unwrap()).unwrap();
        assert_eq!(json["searchQuery"], "Taylor Swift");
        assert_eq!(json["type"], "artist");
    }

    #[test]
    fn test_validate_http_response() {
        let ctx = TestRunContext::new("logs");

        let ok = ctx.validate_ok(&response(200, Some("application/json; charset=utf-8"), "{}"));
        assert!(ok.is_valid);

        let wrong = ctx.validate_http_response(
            &response(200, Some("text/html"), "<html/>"),
            StatusCode::CREATED,
        );
        assert!(!wrong.is_valid);
        assert!(!wrong.validations.status_code);
        assert!(!wrong.validations.content_type);
        assert!(wrong.validations.has_data);

        let empty = ctx.validate_http_response(&response(204, None, ""), StatusCode::NO_CONTENT);
        assert!(!empty.is_valid);
        assert!(empty.validations.status_code);
        assert!(!empty.validations.has_data);
    }

    #[test]
    fn test_json_null_body_has_no_data() {
        let ctx = TestRunContext::new("logs");

        let null = ctx.validate_ok(&response(200, Some("application/json"), "null"));
        assert!(!null.is_valid);
        assert!(null.validations.content_type);
        assert!(!null.validations.has_data);

        let blank = ctx.validate_ok(&response(200, Some("application/json"), "  \n"));
        assert!(!blank.validations.has_data);

        let zero = ctx.validate_ok(&response(200, Some("application/json"), "[]"));
        assert!(zero.validations.has_data);
    }

    #[test]
    fn test_setup_environment_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let ctx = TestRunContext::new(&dir);
        let info = ctx.setup_environment().unwrap();
        assert!(dir.is_dir());
        assert_eq!(info.logs_dir, dir);
        assert!(!info.environment.is_empty());
        // a second call is harmless
        ctx.setup_environment().unwrap();
    }

    #[test]
    fn test_summary_serializes_flat() {
        let mut ctx = TestRunContext::new("logs");
        ctx.record_pass();
        let json = serde_json::to_value(ctx.summary()).unwrap();
        assert_eq!(json["passedTests"], 1);
        assert_eq!(json["totalTests"], 1);
        assert_eq!(json["successRate"], "100.00%");
        assert!(json["totalTime"].is_null());
    }
}
