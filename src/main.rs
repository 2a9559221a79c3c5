use anyhow::Result;
use llm_api_bench::presets::describe_presets;
use llm_api_bench::{ApiConfig, BenchmarkRunner, Cli, Config, ReportBuilder};
use log::{LevelFilter, Metadata, Record, debug, info};
use ringlog::{Drain, LogBuilder, MultiLogBuilder, Output, Stderr};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LOG_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

/// Parse log filter strings like "hyper=info" into a map of module prefix to level filter
fn parse_log_filters(filters: &[String]) -> HashMap<String, LevelFilter> {
    let mut map = HashMap::new();
    for filter in filters {
        if let Some((module, level)) = filter.split_once('=') {
            let level_filter = match level.to_lowercase().as_str() {
                "error" => LevelFilter::Error,
                "warn" => LevelFilter::Warn,
                "info" => LevelFilter::Info,
                "debug" => LevelFilter::Debug,
                "trace" => LevelFilter::Trace,
                "off" => LevelFilter::Off,
                _ => continue,
            };
            map.insert(module.to_string(), level_filter);
        }
    }
    map
}

/// Check if a log record should be filtered based on per-module filters
fn should_log(metadata: &Metadata, filters: &HashMap<String, LevelFilter>) -> bool {
    let target = metadata.target();

    for (module_prefix, level_filter) in filters {
        if target.starts_with(module_prefix) {
            return metadata.level() <= *level_filter;
        }
    }

    true
}

/// Logger with per-module filtering that writes to a ringlog output
struct FilteredLogger {
    output: Mutex<Box<dyn Output>>,
    max_level: LevelFilter,
    filters: HashMap<String, LevelFilter>,
}

impl log::Log for FilteredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level && should_log(metadata, &self.filters)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata())
            && let Ok(mut output) = self.output.lock()
        {
            let message = format!("{}\n", record.args());
            let _ = output.write_all(message.as_bytes());
        }
    }

    fn flush(&self) {
        if let Ok(mut output) = self.output.lock() {
            let _ = output.flush();
        }
    }
}

/// Flushes whatever the logger still buffers; call before exiting.
struct LogFlusher {
    drain: Option<Arc<Mutex<Box<dyn Drain>>>>,
}

impl LogFlusher {
    fn flush(&self) {
        if let Some(drain) = &self.drain
            && let Ok(mut drain) = drain.lock()
        {
            let _ = drain.flush();
        }
        log::logger().flush();
    }
}

fn init_logging(config: &Config) -> Result<LogFlusher> {
    let mut log_level = config.log.level.to_level_filter();
    // quiet keeps warnings and errors but drops per-iteration progress
    if config.output.quiet {
        log_level = log_level.min(LevelFilter::Warn);
    }

    let output: Box<dyn Output> = Box::new(Stderr::new());
    let filters = parse_log_filters(&config.log.filter);

    if filters.is_empty() {
        let base_log = LogBuilder::new()
            .output(output)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to initialize logger: {}", e))?;

        let drain = Arc::new(Mutex::new(
            MultiLogBuilder::new()
                .level_filter(log_level)
                .default(base_log)
                .build()
                .start(),
        ));

        // ringlog buffers records; the drain has to be flushed to emit them
        let background = drain.clone();
        std::thread::spawn(move || {
            loop {
                if let Ok(mut drain) = background.lock() {
                    let _ = drain.flush();
                }
                std::thread::sleep(LOG_FLUSH_INTERVAL);
            }
        });

        Ok(LogFlusher { drain: Some(drain) })
    } else {
        let logger = FilteredLogger {
            output: Mutex::new(output),
            max_level: log_level,
            filters,
        };

        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(log_level);

        Ok(LogFlusher { drain: None })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    if cli.list_presets {
        print!("{}", describe_presets());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?.apply_cli(&cli)?;
    let logs = init_logging(&config)?;

    let (preset, prompt) = cli.prompt();
    let quiet = config.output.quiet;

    if !quiet {
        println!("{}", "=".repeat(60));
        println!("LLM API Benchmark Tool");
        println!("{}", "=".repeat(60));
        if let Some(preset) = preset {
            println!("   Preset: {}", preset.name());
        }
        println!("\nDetecting API configuration from environment...");
    }

    let Some(mut api) = ApiConfig::from_env() else {
        eprintln!("\nError: No LLM API detected from environment variables.");
        eprintln!("Supported providers:");
        eprintln!("  - ANTHROPIC_API_KEY / ANTHROPIC_AUTH_TOKEN (Anthropic/Claude)");
        eprintln!("  - OPENAI_API_KEY (OpenAI)");
        eprintln!("  - AZURE_OPENAI_API_KEY (Azure OpenAI)");
        eprintln!("  - GOOGLE_GENERATIVE_AI_API_KEY (Google Gemini)");
        eprintln!("  - AWS_ACCESS_KEY_ID (AWS Bedrock)");
        logs.flush();
        std::process::exit(1);
    };

    if let Some(ref model) = cli.model {
        api = api.with_model(model);
    }

    if !quiet {
        println!("   Detected: {}", api.provider);
        println!("   Endpoint: {}", api.endpoint);
        println!("   Model: {}", api.model);
        println!(
            "\nRunning benchmark ({} iterations)...\n",
            config.load.iterations
        );
    }

    // Iterations run one at a time, so a single-threaded runtime is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async { run_benchmark(api, config, prompt).await });
    logs.flush();
    result
}

async fn run_benchmark(api: ApiConfig, config: Config, prompt: String) -> Result<()> {
    debug!("Initializing benchmark runner");
    let report_builder = ReportBuilder::new(&api, &prompt);
    let runner = BenchmarkRunner::new(api, &config)?;

    info!("Starting benchmark run");
    let results = runner.run(&prompt, config.load.iterations).await;

    let report = report_builder.build(&results);
    let paths = report.write(&config.output.directory).await?;
    info!("Reports written to {}", paths.directory.display());

    report.print_console_report(Some(&paths));
    Ok(())
}
