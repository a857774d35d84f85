use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, ensure, Context, Result};
use serde_json::json;

use harness::auth::{fetch_token, Credentials};
use harness::context::{EnvironmentInfo, RunSummary, TestRunContext};
use harness::fixtures::ApiConfig;
use harness::logger::RunLogger;
use harness::metrics::{MetricsCollector, MetricsReport};
use harness::request::{HttpResponse, RequestClient};
use harness::{AuthError, HttpsClient, Transport};

use crate::cases::ContractCase;

pub const SETUP_CASE: &str = "TC-SETUP";
pub const SUMMARY_CASE: &str = "TC-SUMMARY";
pub const RESPONSE_TIME_METRIC: &str = "responseTime_ms";

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub id: &'static str,
    pub passed: bool,
    pub status: Option<u16>,
    pub duration_ms: u64,
    pub message: Option<String>,
}

/// Everything one contract run owns: the client, its bookkeeping and the
/// log it writes.
pub struct Run<T = HttpsClient> {
    pub client: RequestClient<T>,
    pub context: TestRunContext,
    pub metrics: MetricsCollector,
    pub logger: RunLogger,
}

impl<T: Transport> Run<T> {
    pub fn new(client: RequestClient<T>, log_dir: impl AsRef<Path>) -> Self {
        let log_dir = log_dir.as_ref();
        let api_config = ApiConfig {
            base_url: client.base_url().to_string(),
            timeout_ms: client.timeout().as_millis() as u64,
            ..Default::default()
        };
        Run {
            client,
            context: TestRunContext::new(log_dir).with_api_config(api_config),
            metrics: MetricsCollector::new(),
            logger: RunLogger::new(log_dir),
        }
    }

    /// Starts the clock, prepares the log directory and installs a fresh
    /// token in both the context and the client.
    pub async fn setup(
        &mut self,
        auth: &impl Transport,
        auth_url: &str,
        credentials: &Credentials,
    ) -> Result<EnvironmentInfo> {
        self.logger.info(SETUP_CASE, "FETCH_TOKEN", json!({}));
        self.context.start_timer();
        let environment = self
            .context
            .setup_environment()
            .with_context(|| format!("could not create {}", self.context.log_dir().display()))?;

        let token = match fetch_token(auth, auth_url, credentials, self.client.timeout()).await {
            Ok(token) => token,
            Err(e) => {
                let status = match &e {
                    AuthError::Request(r) => r.status().map(|s| s.as_u16()),
                    _ => None,
                };
                self.logger.error(
                    SETUP_CASE,
                    "TOKEN_INVALID",
                    json!({"status": status, "message": e.to_string()}),
                );
                self.context.record_fail();
                return Err(e).context("could not obtain a bearer token");
            }
        };

        self.client.set_token(&token)?;
        self.context.set_token(token);
        self.logger.success(SETUP_CASE, "TOKEN_APPLIED", json!({}));
        Ok(environment)
    }

    pub async fn execute(&mut self, case: &ContractCase) -> CaseOutcome {
        self.logger.info(
            case.id,
            "REQUEST_START",
            json!({
                "method": case.method.as_str(),
                "path": case.path,
                "description": case.description,
            }),
        );

        let started = Instant::now();
        let result = self
            .client
            .send(case.method.clone(), &case.path, None, case.options())
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, verdict) = match &result {
            Ok(response) => (
                Some(response.status.as_u16()),
                self.judge(case, response, duration_ms),
            ),
            Err(e) => match e.response() {
                Some(response) => (
                    Some(response.status.as_u16()),
                    self.judge(case, response, duration_ms),
                ),
                None => (None, Err(anyhow!("{e}"))),
            },
        };

        if let Some(status) = status {
            self.metrics.record_metric(case.endpoint, duration_ms, status);
        }

        let message = match &verdict {
            Ok(()) => {
                self.context.record_pass();
                self.context
                    .record_metric(case.id, RESPONSE_TIME_METRIC, duration_ms as f64);
                self.logger.metric(case.id, RESPONSE_TIME_METRIC, duration_ms);
                let action = if result.is_ok() {
                    "REQUEST_SUCCESS"
                } else {
                    "EXPECTED_ERROR"
                };
                self.logger.success(case.id, action, json!({"status": status}));
                None
            }
            Err(e) => {
                let message = format!("{e:#}");
                self.context.record_fail();
                self.logger.error(
                    case.id,
                    "ERROR",
                    json!({"status": status, "message": message}),
                );
                Some(message)
            }
        };

        let passed = message.is_none();
        self.metrics.record_test_result(case.id, passed, duration_ms);

        CaseOutcome {
            id: case.id,
            passed,
            status,
            duration_ms,
            message,
        }
    }

    pub fn skip(&mut self, case: &ContractCase) {
        self.context.record_skip();
        self.logger.info(case.id, "SKIPPED", json!({"description": case.description}));
    }

    fn judge(&self, case: &ContractCase, response: &HttpResponse, duration_ms: u64) -> Result<()> {
        let status = response.status.as_u16();
        ensure!(
            case.accept.contains(&status),
            "status {status} is not one of {:?}",
            case.accept
        );
        if let Some(limit) = case.within_ms {
            ensure!(
                duration_ms < limit,
                "took {duration_ms}ms, limit is {limit}ms"
            );
        }
        if response.status.is_success() && case.expects_json {
            let validation = self
                .context
                .validate_http_response(response, response.status);
            ensure!(
                validation.is_valid,
                "response is not valid JSON content: {:?}",
                validation.validations
            );
        }
        if let Some(check) = case.check {
            check(response)?;
        }
        Ok(())
    }

    /// Logs the run summary and clears all run state.
    pub fn teardown(&mut self) -> (RunSummary, MetricsReport) {
        let summary = self.context.summary();
        self.logger.info(
            SUMMARY_CASE,
            "RUN_COMPLETE",
            serde_json::to_value(&summary).unwrap_or_default(),
        );
        let report = self.metrics.generate_report();

        self.context.reset();
        self.metrics.reset();
        self.client.clear_token();
        (summary, report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use hyper::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Body, Request, Response,
    };

    use harness::auth::Credentials;
    use harness::fixtures::TestData;
    use harness::logger::{Level, LogEntry};
    use harness::request::RequestClient;
    use harness::{BoxError, Transport};

    use super::{Run, RESPONSE_TIME_METRIC};
    use crate::cases::catalogue;

    /// Answers by path and remembers the Authorization header it saw.
    struct MockApi {
        calls: AtomicUsize,
        auth_headers: Mutex<Vec<String>>,
    }

    impl MockApi {
        fn new() -> Arc<Self> {
            Arc::new(MockApi {
                calls: AtomicUsize::new(0),
                auth_headers: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for MockApi {
        async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let auth = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
                .to_string();
            self.auth_headers.lock().unwrap().push(auth);

            let path = request.uri().path().to_string();
            let (status, body) = match path.as_str() {
                "/api/token" => (200, r#"{"access_token":"tok-1"}"#),
                "/v1/albums/4aawyAB9vmqN3uQ7FjRGTy" => (200, r#"{"name":"Some Album"}"#),
                "/v1/albums/xxxxx" => (400, r#"{"error":{"status":400}}"#),
                "/v1/broken" => return Err("connection reset by peer".into()),
                _ => (404, r#"{"error":{"status":404}}"#),
            };
            Ok(Response::builder()
                .status(status)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))?)
        }
    }

    fn run(api: &Arc<MockApi>, log_dir: &std::path::Path) -> Run<Arc<MockApi>> {
        let client = RequestClient::with_transport(
            api.clone(),
            "http://mock/v1",
            Duration::from_millis(500),
        );
        Run::new(client, log_dir)
    }

    fn logged(run: &Run<Arc<MockApi>>) -> Vec<LogEntry> {
        std::fs::read_to_string(run.logger.path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn case(id: &str) -> crate::cases::ContractCase {
        catalogue(&TestData::default())
            .into_iter()
            .find(|c| c.id == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_setup_installs_token_everywhere() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());

        let env = run
            .setup(&api, "http://mock/api/token", &Credentials::new("id", "secret"))
            .await
            .unwrap();
        assert_eq!(env.logs_dir, tmp.path());
        assert_eq!(run.context.token(), Some("tok-1"));
        assert!(run.client.has_token());

        run.execute(&case("TC-001")).await;
        assert_eq!(api.auth_headers.lock().unwrap()[1], "Bearer tok-1");

        let actions: Vec<_> = logged(&run).into_iter().map(|e| e.action).collect();
        assert_eq!(actions[..2], ["FETCH_TOKEN", "TOKEN_APPLIED"]);
    }

    #[tokio::test]
    async fn test_setup_without_credentials_fails_offline() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());

        let err = run
            .setup(&api, "http://mock/api/token", &Credentials::new("", ""))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("CLIENT_ID"));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.context.summary().execution.failed_tests, 1);
        assert!(!run.client.has_token());

        let last = logged(&run).pop().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.action, "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn test_accepted_success_is_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());

        let outcome = run.execute(&case("TC-001")).await;
        assert!(outcome.passed, "{:?}", outcome.message);
        assert_eq!(outcome.status, Some(200));

        let summary = run.context.summary();
        assert_eq!(summary.execution.passed_tests, 1);
        assert!(run.context.metric("TC-001", RESPONSE_TIME_METRIC).is_some());

        let stats = run.metrics.endpoint_stats("/albums/{id}").unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.status_codes, vec![200]);

        let levels: Vec<_> = logged(&run).into_iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![Level::Info, Level::Metric, Level::Success]);
    }

    #[tokio::test]
    async fn test_expected_error_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());

        let outcome = run.execute(&case("TC-002")).await;
        assert!(outcome.passed, "{:?}", outcome.message);
        assert_eq!(outcome.status, Some(400));
        let last = logged(&run).pop().unwrap();
        assert_eq!(last.action, "EXPECTED_ERROR");
    }

    #[tokio::test]
    async fn test_unexpected_status_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());

        // the mock answers 404 for an album list
        let outcome = run.execute(&case("TC-003")).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.status, Some(404));
        assert!(outcome.message.unwrap().contains("404"));
        assert_eq!(run.context.summary().execution.failed_tests, 1);
        assert_eq!(run.metrics.endpoint_stats("/albums").unwrap().count, 1);
        assert_eq!(logged(&run).pop().unwrap().level, Level::Error);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_without_endpoint_sample() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());

        let mut broken = case("TC-001");
        broken.path = "/broken".to_string();
        let outcome = run.execute(&broken).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.status, None);
        assert!(run.metrics.endpoint_stats("/albums/{id}").is_none());
        assert_eq!(run.metrics.test_results().len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_resets_run_state() {
        let tmp = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut run = run(&api, tmp.path());
        run.setup(&api, "http://mock/api/token", &Credentials::new("id", "secret"))
            .await
            .unwrap();
        run.execute(&case("TC-001")).await;
        run.execute(&case("TC-003")).await;
        run.skip(&case("TC-012"));

        let (summary, report) = run.teardown();
        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.execution.skipped_tests, 1);
        assert_eq!(summary.success_rate, "50.00%");
        assert_eq!(report.test_summary.total, 2);

        assert!(!run.context.is_token_set());
        assert!(!run.client.has_token());
        assert_eq!(run.context.summary().total_tests, 0);
        assert!(run.metrics.test_results().is_empty());

        let last = logged(&run).pop().unwrap();
        assert_eq!(last.test_case, "TC-SUMMARY");
        assert_eq!(last.details.unwrap()["totalTests"], 2);
    }
}
