use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::client::RequestResult;
use crate::metrics::Metrics;
use crate::provider::ApiConfig;
use crate::stats::{Distribution, Spread};

pub const MARKDOWN_FILE: &str = "benchmark-report.md";
pub const JSON_FILE: &str = "benchmark-data.json";

/// Print with timestamp prefix
macro_rules! output {
    () => {
        let now = chrono::Utc::now();
        println!("{}", now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false));
    };
    ($($arg:tt)*) => {{
        let now = chrono::Utc::now();
        print!("{} ", now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false));
        println!($($arg)*);
    }};
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    // Metadata
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
    pub iterations: usize,

    // Statistics over successful requests
    pub response_time: Distribution,
    pub ttft: Spread,
    pub tps: Spread,

    // Summary
    pub total_tokens: u64,
    pub success_count: usize,
    pub failure_count: usize,

    pub results: Vec<RequestResult>,
}

/// On-disk shape of `benchmark-data.json`: summaries are flattened into
/// `avg_`/`min_`/`max_`/`pNN_` keys.
#[derive(Serialize)]
struct ReportRecord<'a> {
    timestamp: &'a DateTime<Utc>,
    version: &'a str,
    provider: &'a str,
    endpoint: &'a str,
    model: &'a str,
    prompt: &'a str,
    iterations: usize,

    avg_response_time: f64,
    min_response_time: f64,
    max_response_time: f64,
    p50_response_time: f64,
    p95_response_time: f64,
    p99_response_time: f64,

    avg_ttft: f64,
    min_ttft: f64,
    max_ttft: f64,

    avg_tps: f64,
    min_tps: f64,
    max_tps: f64,

    total_tokens: u64,
    success_count: usize,
    failure_count: usize,

    results: &'a [RequestResult],
}

impl Serialize for BenchmarkReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportRecord {
            timestamp: &self.timestamp,
            version: &self.version,
            provider: &self.provider,
            endpoint: &self.endpoint,
            model: &self.model,
            prompt: &self.prompt,
            iterations: self.iterations,
            avg_response_time: self.response_time.mean,
            min_response_time: self.response_time.min,
            max_response_time: self.response_time.max,
            p50_response_time: self.response_time.p50,
            p95_response_time: self.response_time.p95,
            p99_response_time: self.response_time.p99,
            avg_ttft: self.ttft.mean,
            min_ttft: self.ttft.min,
            max_ttft: self.ttft.max,
            avg_tps: self.tps.mean,
            min_tps: self.tps.min,
            max_tps: self.tps.max,
            total_tokens: self.total_tokens,
            success_count: self.success_count,
            failure_count: self.failure_count,
            results: &self.results,
        }
        .serialize(serializer)
    }
}

/// Run metadata captured before the benchmark starts.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    timestamp: DateTime<Utc>,
    provider: String,
    endpoint: String,
    model: String,
    prompt: String,
}

impl ReportBuilder {
    pub fn new(api: &ApiConfig, prompt: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: api.provider.to_string(),
            endpoint: api.endpoint.clone(),
            model: api.model.clone(),
            prompt: prompt.to_string(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Aggregates `results` into a report.
    ///
    /// Statistics cover successful requests only; TTFT additionally skips
    /// results that never observed a first chunk. With no successes every
    /// statistic is zero, and `results` always keeps the full list.
    pub fn build(&self, results: &[RequestResult]) -> BenchmarkReport {
        let (successful, failed): (Vec<&RequestResult>, Vec<&RequestResult>) =
            results.iter().partition(|r| r.success);

        let response_times: Vec<f64> = successful.iter().map(|r| r.response_time).collect();
        let ttfts: Vec<f64> = successful
            .iter()
            .map(|r| r.ttft)
            .filter(|ttft| *ttft > 0.0)
            .collect();
        let tps_values: Vec<f64> = successful.iter().map(|r| r.tps).collect();

        BenchmarkReport {
            timestamp: self.timestamp,
            version: env!("CARGO_PKG_VERSION").to_string(),
            provider: self.provider.clone(),
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            iterations: results.len(),
            response_time: Distribution::of(&response_times),
            ttft: Spread::of(&ttfts),
            tps: Spread::of(&tps_values),
            total_tokens: successful.iter().map(|r| r.tokens).sum(),
            success_count: successful.len(),
            failure_count: failed.len(),
            results: results.to_vec(),
        }
    }
}

/// Locations of the files written by [`BenchmarkReport::write`].
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub directory: PathBuf,
    pub markdown: PathBuf,
    pub json: PathBuf,
}

impl BenchmarkReport {
    pub fn failures(&self) -> impl Iterator<Item = &RequestResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# LLM API Benchmark Report\n".to_string(),
            "## Test Information".to_string(),
            format!("- **Time**: {}", self.timestamp.to_rfc3339()),
            format!("- **Provider**: {}", self.provider),
            format!("- **Endpoint**: {}", self.endpoint),
            format!("- **Model**: {}", self.model),
            format!("- **Prompt**: {}", self.prompt),
            format!("- **Iterations**: {}\n", self.iterations),
        ];

        if self.failure_count > 0 {
            lines.push("## Errors".to_string());
            lines.push(format!(
                "- **Success**: {} | **Failed**: {}\n",
                self.success_count, self.failure_count
            ));
            for r in self.failures() {
                lines.push(format!(
                    "- Iteration {}: {}",
                    r.iteration,
                    r.error.as_deref().unwrap_or_default()
                ));
            }
            lines.push(String::new());
        }

        let rt = &self.response_time;
        lines.extend([
            "## Performance Metrics\n".to_string(),
            "### Response Time (seconds)".to_string(),
            "| Metric | Value |\n|--------|-------|".to_string(),
            format!("| Average | {:.3}s |", rt.mean),
            format!("| Minimum | {:.3}s |", rt.min),
            format!("| Maximum | {:.3}s |", rt.max),
            format!("| P50 | {:.3}s |", rt.p50),
            format!("| P95 | {:.3}s |", rt.p95),
            format!("| P99 | {:.3}s |\n", rt.p99),
            "### Time to First Token (TTFT)".to_string(),
            "| Metric | Value |\n|--------|-------|".to_string(),
            format!("| Average | {:.3}s |", self.ttft.mean),
            format!("| Minimum | {:.3}s |", self.ttft.min),
            format!("| Maximum | {:.3}s |\n", self.ttft.max),
            "### Tokens Per Second (TPS)".to_string(),
            "| Metric | Value |\n|--------|-------|".to_string(),
            format!("| Average | {:.2} |", self.tps.mean),
            format!("| Minimum | {:.2} |", self.tps.min),
            format!("| Maximum | {:.2} |\n", self.tps.max),
            format!("**Total Tokens**: {}\n", self.total_tokens),
            "## Detailed Results\n".to_string(),
            "| # | Response Time | TTFT | Tokens | TPS | Status |".to_string(),
            "|---|---------------|------|--------|-----|--------|".to_string(),
        ]);

        for r in &self.results {
            if r.success {
                lines.push(format!(
                    "| {} | {:.3}s | {:.3}s | {} | {:.2} | OK |",
                    r.iteration, r.response_time, r.ttft, r.tokens, r.tps
                ));
            } else {
                lines.push(format!("| {} | - | - | - | - | FAIL |", r.iteration));
            }
        }

        lines.join("\n")
    }

    /// Writes the Markdown and JSON reports to a fresh timestamped directory under `output_dir`.
    pub async fn write(&self, output_dir: &Path) -> Result<ReportPaths> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let directory = output_dir.join(format!("llm-benchmark-{}", stamp));
        tokio::fs::create_dir_all(&directory).await?;

        let markdown = directory.join(MARKDOWN_FILE);
        tokio::fs::write(&markdown, self.to_markdown()).await?;

        let json = directory.join(JSON_FILE);
        tokio::fs::write(&json, self.to_json()?).await?;

        Ok(ReportPaths {
            directory,
            markdown,
            json,
        })
    }

    /// Prints the end-of-run summary to stdout.
    pub fn print_console_report(&self, paths: Option<&ReportPaths>) {
        output!();
        output!("-----");
        output!("Benchmark Complete");

        if self.success_count > 0 {
            output!("Response Time: {:.3}s (avg)", self.response_time.mean);
            output!("TTFT: {:.3}s (avg)", self.ttft.mean);
            output!("TPS: {:.2} (avg)", self.tps.mean);
            output!(
                "Success: {} | Failed: {}",
                self.success_count, self.failure_count
            );
        } else {
            output!("All requests failed! Check errors below:");
        }

        if let Some(paths) = paths {
            output!("Report saved to: {}", paths.markdown.display());
        }

        let counts = Metrics::counts();
        output!("{}", counts.summary());

        if self.failure_count > 0 {
            output!("{}", counts.error_breakdown());
            for r in self.failures() {
                output!(
                    "  Iteration {}: {}",
                    r.iteration,
                    r.error.as_deref().unwrap_or_default()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn builder() -> ReportBuilder {
        let api = ApiConfig {
            provider: ProviderKind::Anthropic,
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-test".to_string(),
            headers: BTreeMap::new(),
        };
        ReportBuilder::new(&api, "Say hi")
    }

    fn ok(iteration: usize, secs: f64, ttft: f64, tokens: u64) -> RequestResult {
        let ttft = (ttft > 0.0).then(|| Duration::from_secs_f64(ttft));
        RequestResult::success(iteration, Duration::from_secs_f64(secs), ttft, tokens)
    }

    fn failed(iteration: usize, error: &str) -> RequestResult {
        RequestResult::failure(iteration, Duration::from_millis(100), error)
    }

    #[test]
    fn test_empty_results() {
        let report = builder().build(&[]);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 0);
        assert_eq!(report.total_tokens, 0);
        assert_eq!(report.response_time, Distribution::default());
        assert_eq!(report.ttft, Spread::default());
        assert_eq!(report.tps, Spread::default());
        assert!(report.to_json().is_ok());
        assert!(report.to_markdown().contains("## Detailed Results"));
    }

    #[test]
    fn test_all_failures_yield_zero_stats() {
        let results = vec![failed(1, "HTTP 401: unauthorized"), failed(2, "Request timeout after 120s")];
        let report = builder().build(&results);

        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.response_time, Distribution::default());
        assert_eq!(report.tps.mean, 0.0);
        assert!(!report.ttft.mean.is_nan());

        let md = report.to_markdown();
        assert!(md.contains("## Errors"));
        assert!(md.contains("- Iteration 1: HTTP 401: unauthorized"));
        assert!(md.contains("| 2 | - | - | - | - | FAIL |"));
    }

    #[test]
    fn test_statistics_over_successes() {
        let results = vec![
            ok(1, 1.0, 0.2, 10),
            failed(2, "HTTP 500: boom"),
            ok(3, 2.0, 0.4, 20),
            ok(4, 4.0, 0.0, 40),
        ];
        let report = builder().build(&results);

        assert_eq!(report.success_count, 3);
        assert_eq!(report.failure_count, 1);
        assert_eq!(
            report.success_count + report.failure_count,
            report.results.len()
        );
        assert_eq!(report.total_tokens, 70);

        let rt = report.response_time;
        assert!((rt.mean - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(rt.min, 1.0);
        assert_eq!(rt.max, 4.0);
        assert_eq!(rt.p50, 2.0);
        assert_eq!(rt.p95, 4.0);
        assert_eq!(rt.p99, 4.0);

        // zero TTFT is left out of TTFT stats only
        assert!((report.ttft.mean - 0.3).abs() < 1e-9);
        assert!((report.ttft.min - 0.2).abs() < 1e-9);
        assert!((report.ttft.max - 0.4).abs() < 1e-9);

        // every success has 10 tokens/s
        assert!((report.tps.mean - 10.0).abs() < 1e-9);
        assert!((report.tps.min - 10.0).abs() < 1e-9);
        assert!((report.tps.max - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_is_idempotent() {
        let results = vec![ok(1, 0.7, 0.1, 9), ok(2, 0.3, 0.05, 4), failed(3, "x")];
        let builder = builder();
        let a = builder.build(&results);
        let b = builder.build(&results);

        assert_eq!(a.response_time, b.response_time);
        assert_eq!(a.ttft, b.ttft);
        assert_eq!(a.tps, b.tps);
        assert_eq!(a.total_tokens, b.total_tokens);
        assert_eq!(a.results, b.results);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_json_shape() {
        let report = builder().build(&[ok(1, 0.5, 0.1, 5), failed(2, "HTTP 500: boom")]);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["provider"], "Anthropic");
        assert_eq!(value["model"], "claude-test");
        assert_eq!(value["iterations"], 2);
        assert_eq!(value["success_count"], 1);
        assert_eq!(value["failure_count"], 1);
        assert_eq!(value["avg_response_time"], 0.5);
        assert_eq!(value["p50_response_time"], 0.5);
        assert_eq!(value["p99_response_time"], 0.5);
        assert_eq!(value["avg_ttft"], 0.1);
        assert_eq!(value["min_tps"], 10.0);
        assert_eq!(value["total_tokens"], 5);
        assert!(value.get("response_time").is_none());
        assert_eq!(value["results"][0]["error"], serde_json::Value::Null);
        assert_eq!(value["results"][1]["error"], "HTTP 500: boom");
    }

    #[test]
    fn test_markdown_success_rows() {
        let report = builder().build(&[ok(1, 0.5, 0.125, 5)]);
        let md = report.to_markdown();

        assert!(md.starts_with("# LLM API Benchmark Report"));
        assert!(md.contains("- **Provider**: Anthropic"));
        assert!(!md.contains("## Errors"));
        assert!(md.contains("| Average | 0.500s |"));
        assert!(md.contains("| 1 | 0.500s | 0.125s | 5 | 10.00 | OK |"));
        assert!(md.contains("**Total Tokens**: 5"));
        assert!(md.contains("| Maximum | 0.125s |\n\n### Tokens Per Second (TPS)"));
        assert!(md.ends_with("|---|---------------|------|--------|-----|--------|\n| 1 | 0.500s | 0.125s | 5 | 10.00 | OK |"));
    }

    #[tokio::test]
    async fn test_write_reports() {
        let dir = tempfile::tempdir().unwrap();
        let report = builder().build(&[ok(1, 0.5, 0.1, 5)]);

        let paths = report.write(dir.path()).await.unwrap();

        assert!(paths.directory.starts_with(dir.path()));
        assert!(
            paths
                .directory
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("llm-benchmark-")
        );
        let md = std::fs::read_to_string(&paths.markdown).unwrap();
        assert_eq!(md, report.to_markdown());
        let json = std::fs::read_to_string(&paths.json).unwrap();
        assert_eq!(json, report.to_json().unwrap());
    }
}
