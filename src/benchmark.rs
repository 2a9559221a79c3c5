use anyhow::Result;
use log::{debug, info};
use std::time::Duration;
use tokio::time::sleep;

use crate::client::{ClientConfig, RequestResult, StreamingClient};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::provider::ApiConfig;

/// Drives the streaming client through a sequence of benchmark iterations.
///
/// Iterations run strictly one after another so that only a single request
/// is ever in flight, with a fixed pause between consecutive requests to stay
/// clear of burst rate limits.
///
/// # Examples
///
/// ```no_run
/// use llm_api_bench::{ApiConfig, BenchmarkRunner, Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let api = ApiConfig::from_env().expect("no provider configured");
/// let runner = BenchmarkRunner::new(api, &Config::default())?;
/// let results = runner.run("Write a single sentence greeting.", 5).await;
/// assert_eq!(results.len(), 5);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    client: StreamingClient,
    pacing: Duration,
}

impl BenchmarkRunner {
    pub fn new(api: ApiConfig, config: &Config) -> Result<Self> {
        let client = StreamingClient::new(
            api,
            ClientConfig {
                timeout: config.timeout()?,
                max_tokens: config.request.max_tokens,
            },
        )?;

        Ok(Self::with_client(client, config.pacing()?))
    }

    pub fn with_client(client: StreamingClient, pacing: Duration) -> Self {
        Self { client, pacing }
    }

    pub fn api(&self) -> &ApiConfig {
        self.client.api()
    }

    /// Runs `iterations` requests and returns their results in order.
    ///
    /// Results are numbered from 1. Failures are recorded as results rather
    /// than aborting the run.
    pub async fn run(&self, prompt: &str, iterations: usize) -> Vec<RequestResult> {
        let mut results = Vec::with_capacity(iterations);

        for iteration in 1..=iterations {
            info!("Running iteration {}/{}...", iteration, iterations);

            let result = self.client.execute(prompt, iteration).await;
            let counts = Metrics::counts();

            if result.success {
                info!(
                    "Iteration {}/{}: {:.3}s, TTFT {:.3}s, {} tokens, {:.2} tok/s (ok: {} err: {})",
                    iteration,
                    iterations,
                    result.response_time,
                    result.ttft,
                    result.tokens,
                    result.tps,
                    counts.success,
                    counts.failed
                );
            } else {
                info!(
                    "Iteration {}/{}: failed after {:.3}s (ok: {} err: {})",
                    iteration, iterations, result.response_time, counts.success, counts.failed
                );
            }

            results.push(result);

            if iteration < iterations && !self.pacing.is_zero() {
                debug!("Pausing {:?} before next request", self.pacing);
                sleep(self.pacing).await;
            }
        }

        results
    }
}
