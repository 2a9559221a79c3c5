use clap::Parser;
use std::path::PathBuf;

use crate::presets::Preset;

#[derive(Parser, Debug)]
#[command(name = "llm-api-bench")]
#[command(author, version, about = "Benchmark the LLM API detected from the environment", long_about = None)]
pub struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of benchmark iterations (default: 5)
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Override the detected model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Custom prompt to send
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Use a preset prompt (takes precedence over --prompt)
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// List available presets and exit
    #[arg(long)]
    pub list_presets: bool,

    /// Directory reports are written under (default: reports)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Resolves the prompt to benchmark: preset, then literal prompt, then the default preset.
    pub fn prompt(&self) -> (Option<Preset>, String) {
        match (self.preset, &self.prompt) {
            (Some(preset), _) => (Some(preset), preset.prompt().to_string()),
            (None, Some(prompt)) => (None, prompt.clone()),
            (None, None) => (Some(Preset::default()), Preset::default().prompt().to_string()),
        }
    }
}
