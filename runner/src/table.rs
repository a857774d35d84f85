use serde::Serialize;
use tabled::Tabled;

use harness::metrics::EndpointStats;

#[derive(Debug, Tabled, Serialize)]
pub struct EndpointTableEntry {
    #[tabled(rename = "Endpoint")]
    pub endpoint: String,
    #[tabled(rename = "Count")]
    pub count: u64,
    #[tabled(rename = "Avg ms")]
    pub avg_ms: u64,
    #[tabled(rename = "Min ms")]
    pub min_ms: u64,
    #[tabled(rename = "Max ms")]
    pub max_ms: u64,
    #[tabled(rename = "P95 ms")]
    pub p95_ms: u64,
    #[tabled(rename = "P99 ms")]
    pub p99_ms: u64,
    #[tabled(rename = "Status codes")]
    pub status_codes: String,
}

impl EndpointTableEntry {
    pub fn new(stats: &EndpointStats) -> Self {
        EndpointTableEntry {
            endpoint: stats.endpoint.clone(),
            count: stats.count,
            avg_ms: stats.avg,
            min_ms: stats.min,
            max_ms: stats.max,
            p95_ms: stats.p95,
            p99_ms: stats.p99,
            status_codes: stats
                .status_codes
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[cfg(test)]
mod tests {
    use tabled::Table;

    use harness::metrics::MetricsCollector;

    use super::EndpointTableEntry;

    #[test]
    fn test_rows_follow_endpoint_stats() {
        let mut metrics = MetricsCollector::new();
        metrics.record_metric("/search", 120, 200);
        metrics.record_metric("/search", 80, 400);

        let rows: Vec<_> = metrics
            .all_endpoint_stats()
            .iter()
            .map(EndpointTableEntry::new)
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_ms, 100);
        assert_eq!(rows[0].status_codes, "200 400");

        let rendered = Table::new(&rows).to_string();
        assert!(rendered.contains("P95 ms"));
        assert!(rendered.contains("/search"));
    }
}
