pub mod benchmark;
pub mod cli;
pub mod client;
pub mod config;
pub mod decoder;
pub mod metrics;
pub mod presets;
pub mod provider;
pub mod report;
pub mod stats;
pub mod tokenizer;

#[cfg(test)]
mod testing;

pub use benchmark::BenchmarkRunner;
pub use cli::Cli;
pub use client::{ClientConfig, ClientError, RequestResult, StreamingClient};
pub use config::Config;
pub use decoder::decode_tokens;
pub use metrics::{Metrics, RequestStatus};
pub use presets::Preset;
pub use provider::{ApiConfig, ProviderKind};
pub use report::{BenchmarkReport, ReportBuilder};
pub use tokenizer::estimate_tokens;
