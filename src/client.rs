use anyhow::Result;
use log::{debug, warn};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::decoder::{DONE_SENTINEL, decode_tokens};
use crate::metrics::{ErrorType, Metrics, RequestStatus};
use crate::provider::{ApiConfig, build_payload};

/// Markers that end a stream even if the server keeps the connection open.
pub const STREAM_SENTINELS: [&str; 2] = [DONE_SENTINEL, "</s>"];

/// Length of the longest entry in [`STREAM_SENTINELS`].
const MAX_SENTINEL_LEN: usize = 6;

/// Error bodies are truncated to this many characters.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() || timed_out(&error) {
            ClientError::Timeout(timeout)
        } else if error.is_connect() {
            ClientError::Connection(error_chain(&error))
        } else {
            ClientError::Other(error_chain(&error))
        }
    }

    fn error_type(&self) -> ErrorType {
        match self {
            ClientError::Connection(_) => ErrorType::Connection,
            ClientError::Http { status, .. } if (400..500).contains(status) => {
                ErrorType::Http4xx(*status)
            }
            ClientError::Http { status, .. } if (500..600).contains(status) => {
                ErrorType::Http5xx(*status)
            }
            ClientError::Http { .. } => ErrorType::Other,
            ClientError::Timeout(_) => ErrorType::Timeout,
            ClientError::Other(_) => ErrorType::Other,
        }
    }
}

/// Joins an error with its sources, since reqwest's top-level message omits the cause.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// True if any cause in the chain is an I/O timeout.
fn timed_out(error: &dyn std::error::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::TimedOut
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Outcome of one benchmark iteration.
///
/// A failed request carries an error message and zeroed measurements; a
/// successful one always reports at least one token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestResult {
    pub iteration: usize,
    pub success: bool,
    /// Total response time in seconds
    pub response_time: f64,
    /// Time to first chunk in seconds, 0 when never observed
    pub ttft: f64,
    pub tokens: u64,
    pub tps: f64,
    pub error: Option<String>,
}

impl RequestResult {
    pub fn success(
        iteration: usize,
        response_time: Duration,
        ttft: Option<Duration>,
        tokens: u64,
    ) -> Self {
        let tokens = tokens.max(1);
        let response_time = response_time.as_secs_f64();
        let tps = if response_time > 0.0 {
            tokens as f64 / response_time
        } else {
            0.0
        };

        Self {
            iteration,
            success: true,
            response_time,
            ttft: ttft.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            tokens,
            tps,
            error: None,
        }
    }

    pub fn failure(iteration: usize, elapsed: Duration, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "Unknown error".to_string();
        }

        Self {
            iteration,
            success: false,
            response_time: elapsed.as_secs_f64(),
            ttft: 0.0,
            tokens: 0,
            tps: 0.0,
            error: Some(error),
        }
    }
}

/// Configuration for creating a [`StreamingClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on connecting and on each read; a stream that keeps
    /// delivering data may run longer than this in total
    pub timeout: Duration,
    /// `max_tokens` sent in the request body
    pub max_tokens: u32,
}

/// Issues single streaming requests and measures them.
#[derive(Debug, Clone)]
pub struct StreamingClient {
    client: Client,
    api: ApiConfig,
    headers: HeaderMap,
    timeout: Duration,
    max_tokens: u32,
}

/// What was read from a successful stream.
struct StreamOutcome {
    text: String,
    ttft: Option<Duration>,
    sentinel: bool,
}

impl StreamingClient {
    /// Creates a client bound to the endpoint described by `api`.
    ///
    /// Fails if a configured header is not a valid HTTP header or if the
    /// underlying HTTP client cannot be built.
    pub fn new(api: ApiConfig, config: ClientConfig) -> Result<Self> {
        // One fresh connection per request, so every iteration pays the same
        // connect cost and the stream is closed once we stop reading.
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &api.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow::anyhow!("invalid header name '{}': {}", name, e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| anyhow::anyhow!("invalid value for header '{}': {}", name, e))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            api,
            headers,
            timeout: config.timeout,
            max_tokens: config.max_tokens,
        })
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Runs one streaming request and reports its timings.
    ///
    /// This never fails: transport errors, timeouts and non-200 responses
    /// are all captured in the returned [`RequestResult`].
    pub async fn execute(&self, prompt: &str, iteration: usize) -> RequestResult {
        Metrics::record_request_sent();

        let payload = build_payload(&self.api, prompt, self.max_tokens);
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                return self.fail(iteration, Duration::ZERO, ClientError::Other(e.to_string()));
            }
        };

        let start = Instant::now();

        match self.stream(body, start).await {
            Ok(outcome) => {
                let response_time = start.elapsed();
                let tokens = decode_tokens(&outcome.text, self.api.provider).max(1);

                Metrics::record_tokens(tokens);
                Metrics::record_request_complete(RequestStatus::Success);

                debug!(
                    "Request {} completed - bytes: {}, sentinel: {}, ttft_ms: {:.1}, total_ms: {:.1}, tokens: {}",
                    iteration,
                    outcome.text.len(),
                    outcome.sentinel,
                    outcome.ttft.unwrap_or_default().as_secs_f64() * 1000.0,
                    response_time.as_secs_f64() * 1000.0,
                    tokens
                );

                RequestResult::success(iteration, response_time, outcome.ttft, tokens)
            }
            Err(e) => self.fail(iteration, start.elapsed(), e),
        }
    }

    fn fail(&self, iteration: usize, elapsed: Duration, error: ClientError) -> RequestResult {
        warn!("Request {} failed: {}", iteration, error);
        Metrics::record_request_complete(RequestStatus::Failed(error.error_type()));
        RequestResult::failure(iteration, elapsed, error.to_string())
    }

    /// Sends the request and reads the event stream until end-of-stream or a sentinel.
    ///
    /// The response (and with it the connection) is dropped before returning.
    async fn stream(&self, body: Vec<u8>, start: Instant) -> Result<StreamOutcome, ClientError> {
        debug!("POST {} ({} byte body)", self.api.endpoint, body.len());

        let request = self
            .client
            .post(&self.api.endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_LENGTH, body.len())
            .body(body);

        let mut response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let mut buffer: Vec<u8> = Vec::new();
        let mut ttft = None;
        let mut sentinel = false;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?
        {
            if chunk.is_empty() {
                continue;
            }
            if ttft.is_none() {
                ttft = Some(start.elapsed());
            }

            let scanned = buffer.len();
            buffer.extend_from_slice(&chunk);

            if contains_sentinel(&buffer, scanned) {
                sentinel = true;
                break;
            }
        }
        drop(response);

        Ok(StreamOutcome {
            text: String::from_utf8_lossy(&buffer).into_owned(),
            ttft,
            sentinel,
        })
    }
}

/// Checks whether a sentinel appears in `buffer`, looking only at bytes
/// that could form a match not already seen when `buffer` was `scanned` long.
fn contains_sentinel(buffer: &[u8], scanned: usize) -> bool {
    let from = scanned.saturating_sub(MAX_SENTINEL_LEN - 1);
    let window = &buffer[from..];
    STREAM_SENTINELS.iter().any(|sentinel| {
        window
            .windows(sentinel.len())
            .any(|w| w == sentinel.as_bytes())
    })
}
