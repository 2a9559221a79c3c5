use metriken::{Counter, LazyCounter, metric};

#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Failed(ErrorType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Connection,
    Http4xx(u16),
    Http5xx(u16),
    Timeout,
    Other,
}

// Request metrics
#[metric(
    name = "requests",
    description = "Total number of requests",
    metadata = { status = "sent" }
)]
pub static REQUESTS_SENT: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "requests",
    description = "Successful requests",
    metadata = { status = "success" }
)]
pub static REQUESTS_SUCCESS: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "requests",
    description = "Failed requests",
    metadata = { status = "failed" }
)]
pub static REQUESTS_FAILED: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "requests",
    description = "Timed out requests",
    metadata = { status = "timeout" }
)]
pub static REQUESTS_TIMEOUT: LazyCounter = LazyCounter::new(Counter::default);

// Error category metrics
#[metric(
    name = "errors",
    description = "Connection errors",
    metadata = { "type" = "connection" }
)]
pub static ERRORS_CONNECTION: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "errors",
    description = "HTTP 4xx errors",
    metadata = { "type" = "http_4xx" }
)]
pub static ERRORS_HTTP_4XX: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "errors",
    description = "HTTP 5xx errors",
    metadata = { "type" = "http_5xx" }
)]
pub static ERRORS_HTTP_5XX: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "errors",
    description = "Other errors",
    metadata = { "type" = "other" }
)]
pub static ERRORS_OTHER: LazyCounter = LazyCounter::new(Counter::default);

// Token metrics
#[metric(
    name = "tokens",
    description = "Estimated output tokens received",
    metadata = { direction = "output" }
)]
pub static TOKENS_OUTPUT: LazyCounter = LazyCounter::new(Counter::default);

/// Point-in-time view of the request counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counts {
    pub sent: u64,
    pub success: u64,
    pub failed: u64,
    pub timeout: u64,
    pub connection_errors: u64,
    pub http_4xx_errors: u64,
    pub http_5xx_errors: u64,
    pub other_errors: u64,
    pub output_tokens: u64,
}

pub struct Metrics;

impl Metrics {
    pub fn record_request_sent() {
        REQUESTS_SENT.increment();
    }

    pub fn record_request_complete(status: RequestStatus) {
        match status {
            RequestStatus::Success => {
                REQUESTS_SUCCESS.increment();
            }
            RequestStatus::Failed(error_type) => {
                REQUESTS_FAILED.increment();
                match error_type {
                    ErrorType::Connection => ERRORS_CONNECTION.increment(),
                    ErrorType::Http4xx(_) => ERRORS_HTTP_4XX.increment(),
                    ErrorType::Http5xx(_) => ERRORS_HTTP_5XX.increment(),
                    ErrorType::Timeout => REQUESTS_TIMEOUT.increment(),
                    ErrorType::Other => ERRORS_OTHER.increment(),
                };
            }
        }
    }

    pub fn record_tokens(output: u64) {
        TOKENS_OUTPUT.add(output);
    }

    pub fn counts() -> Counts {
        Counts {
            sent: REQUESTS_SENT.value(),
            success: REQUESTS_SUCCESS.value(),
            failed: REQUESTS_FAILED.value(),
            timeout: REQUESTS_TIMEOUT.value(),
            connection_errors: ERRORS_CONNECTION.value(),
            http_4xx_errors: ERRORS_HTTP_4XX.value(),
            http_5xx_errors: ERRORS_HTTP_5XX.value(),
            other_errors: ERRORS_OTHER.value(),
            output_tokens: TOKENS_OUTPUT.value(),
        }
    }
}

impl Counts {
    /// One-line request and token totals for the console summary.
    pub fn summary(&self) -> String {
        format!(
            "Requests: {} sent, {} ok, {} failed | Output tokens: {}",
            self.sent, self.success, self.failed, self.output_tokens
        )
    }

    /// Failure breakdown by error class.
    pub fn error_breakdown(&self) -> String {
        format!(
            "Errors: Connection: {} 4xx: {} 5xx: {} Timeout: {} Other: {}",
            self.connection_errors,
            self.http_4xx_errors,
            self.http_5xx_errors,
            self.timeout,
            self.other_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let counts = Counts {
            sent: 5,
            success: 3,
            failed: 2,
            timeout: 1,
            http_5xx_errors: 1,
            output_tokens: 120,
            ..Default::default()
        };

        assert_eq!(
            counts.summary(),
            "Requests: 5 sent, 3 ok, 2 failed | Output tokens: 120"
        );
        assert_eq!(
            counts.error_breakdown(),
            "Errors: Connection: 0 4xx: 0 5xx: 1 Timeout: 1 Other: 0"
        );
    }

    #[test]
    fn test_counters_track_requests() {
        let before = Metrics::counts();
        Metrics::record_request_sent();
        Metrics::record_request_complete(RequestStatus::Success);
        Metrics::record_tokens(7);
        let after = Metrics::counts();

        // counters are process-wide and other tests run concurrently
        assert!(after.sent > before.sent);
        assert!(after.success > before.success);
        assert!(after.output_tokens >= before.output_tokens + 7);
    }
}
