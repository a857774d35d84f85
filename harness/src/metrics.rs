use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Formats `passed / total` as a percentage with two decimals, or `"N/A"`
/// when nothing was counted.
pub fn success_rate(passed: u64, total: u64) -> String {
    if total == 0 {
        return "N/A".to_string();
    }
    format!("{:.2}%", passed as f64 / total as f64 * 100.0)
}

/// Nearest-rank percentile over a copy of `samples`.
///
/// Returns 0 for an empty slice.
pub fn calculate_percentile(samples: &[u64], percentile: f64) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = (percentile / 100.0 * sorted.len() as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[index]
}

#[derive(Debug, Default)]
struct EndpointMetric {
    endpoint: String,
    response_times: Vec<u64>,
    status_codes: Vec<u16>,
    count: u64,
    total_time: u64,
    min_time: u64,
    max_time: u64,
}

impl EndpointMetric {
    fn new(endpoint: &str) -> Self {
        EndpointMetric {
            endpoint: endpoint.to_string(),
            min_time: u64::MAX,
            ..Default::default()
        }
    }

    fn push(&mut self, response_time_ms: u64, status_code: u16) {
        self.response_times.push(response_time_ms);
        self.status_codes.push(status_code);
        self.count += 1;
        self.total_time += response_time_ms;
        self.min_time = self.min_time.min(response_time_ms);
        self.max_time = self.max_time.max(response_time_ms);
    }

    fn stats(&self) -> EndpointStats {
        let mut status_codes = Vec::new();
        for code in &self.status_codes {
            if !status_codes.contains(code) {
                status_codes.push(*code);
            }
        }
        EndpointStats {
            endpoint: self.endpoint.clone(),
            count: self.count,
            avg: (self.total_time as f64 / self.count as f64).round() as u64,
            min: self.min_time,
            max: self.max_time,
            p95: calculate_percentile(&self.response_times, 95.0),
            p99: calculate_percentile(&self.response_times, 99.0),
            status_codes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub endpoint: String,
    pub count: u64,
    pub avg: u64,
    pub min: u64,
    pub max: u64,
    pub p95: u64,
    pub p99: u64,
    pub status_codes: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_name: String,
    pub passed: bool,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub success_rate: String,
    pub total_duration: u64,
    pub average_duration: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub timestamp: String,
    pub test_summary: TestSummary,
    pub endpoint_metrics: Vec<EndpointStats>,
    pub test_results: Vec<TestResult>,
}

/// Response time samples per endpoint plus the ordered list of case
/// outcomes for one run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    endpoints: Vec<EndpointMetric>,
    index: HashMap<String, usize>,
    test_results: Vec<TestResult>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_metric(&mut self, endpoint: &str, response_time_ms: u64, status_code: u16) {
        let slot = match self.index.get(endpoint) {
            Some(slot) => *slot,
            None => {
                self.endpoints.push(EndpointMetric::new(endpoint));
                self.index
                    .insert(endpoint.to_string(), self.endpoints.len() - 1);
                self.endpoints.len() - 1
            }
        };
        self.endpoints[slot].push(response_time_ms, status_code);
    }

    pub fn record_test_result(&mut self, test_name: &str, passed: bool, duration_ms: u64) {
        self.test_results.push(TestResult {
            test_name: test_name.to_string(),
            passed,
            duration_ms,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
    }

    pub fn endpoint_stats(&self, endpoint: &str) -> Option<EndpointStats> {
        self.index
            .get(endpoint)
            .map(|slot| self.endpoints[*slot].stats())
    }

    /// Stats for every endpoint, in the order each was first recorded.
    pub fn all_endpoint_stats(&self) -> Vec<EndpointStats> {
        self.endpoints.iter().map(EndpointMetric::stats).collect()
    }

    pub fn test_results(&self) -> &[TestResult] {
        &self.test_results
    }

    pub fn generate_report(&self) -> MetricsReport {
        let total = self.test_results.len() as u64;
        let passed = self.test_results.iter().filter(|t| t.passed).count() as u64;
        let total_duration: u64 = self.test_results.iter().map(|t| t.duration_ms).sum();
        let average_duration = if total > 0 {
            (total_duration as f64 / total as f64).round() as u64
        } else {
            0
        };

        MetricsReport {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            test_summary: TestSummary {
                total,
                passed,
                failed: total - passed,
                success_rate: success_rate(passed, total),
                total_duration,
                average_duration,
            },
            endpoint_metrics: self.all_endpoint_stats(),
            test_results: self.test_results.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.generate_report())
    }

    pub fn reset(&mut self) {
        self.endpoints.clear();
        self.index.clear();
        self.test_results.clear();
    }
}
