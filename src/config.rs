use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Connect and read budget per request, e.g. "120s"
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Delay between consecutive requests, e.g. "500ms"
    #[serde(default = "default_pacing")]
    pub pacing: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    /// Per-module log level overrides (e.g., ["hyper=info", "reqwest=warn"])
    #[serde(default)]
    pub filter: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            pacing: default_pacing(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            quiet: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: Vec::new(),
        }
    }
}

fn default_timeout() -> String {
    "120s".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_iterations() -> usize {
    5
}

fn default_pacing() -> String {
    "500ms".to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("reports")
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Config {
    /// Loads the configuration file if one is given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("failed to read config {}: {}", path.display(), e)
                })?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Applies command line overrides on top of the file settings.
    pub fn apply_cli(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(iterations) = cli.iterations {
            self.load.iterations = iterations;
        }
        if let Some(ref dir) = cli.output_dir {
            self.output.directory = dir.clone();
        }
        if cli.quiet {
            self.output.quiet = true;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.load.iterations == 0 {
            anyhow::bail!("iterations must be greater than 0");
        }

        if self.request.max_tokens == 0 {
            anyhow::bail!("max_tokens must be greater than 0");
        }

        if self.timeout()?.is_zero() {
            anyhow::bail!("timeout must be greater than 0");
        }

        self.pacing()?;

        Ok(())
    }

    pub fn timeout(&self) -> anyhow::Result<Duration> {
        humantime::parse_duration(&self.request.timeout)
            .map_err(|e| anyhow::anyhow!("invalid timeout '{}': {}", self.request.timeout, e))
    }

    pub fn pacing(&self) -> anyhow::Result<Duration> {
        humantime::parse_duration(&self.load.pacing)
            .map_err(|e| anyhow::anyhow!("invalid pacing '{}': {}", self.load.pacing, e))
    }
}
