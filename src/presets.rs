use clap::ValueEnum;

/// Named prompts that produce roughly fixed-length outputs, so runs stay comparable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Quick,
    Standard,
    Long,
    Throughput,
    #[default]
    Code,
    Json,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Quick,
        Preset::Standard,
        Preset::Long,
        Preset::Throughput,
        Preset::Code,
        Preset::Json,
    ];

    /// Identifier used on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            Preset::Quick => "quick",
            Preset::Standard => "standard",
            Preset::Long => "long",
            Preset::Throughput => "throughput",
            Preset::Code => "code",
            Preset::Json => "json",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Quick => "Quick Test",
            Preset::Standard => "Standard Test",
            Preset::Long => "Long Output Test",
            Preset::Throughput => "Throughput Test",
            Preset::Code => "Code Test",
            Preset::Json => "JSON Test",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Quick => "Short prompt for fast testing (~10 tokens)",
            Preset::Standard => "Medium-length prompt (~20 tokens)",
            Preset::Long => "Longer output test (~100+ tokens)",
            Preset::Throughput => "High token output for TPS testing (~300-500 tokens)",
            Preset::Code => "Programming-related prompt (~500-1000 tokens)",
            Preset::Json => "Structured JSON output test (~30 tokens)",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Preset::Quick => "Write a single sentence greeting.",
            Preset::Standard => {
                "Count from 1 to 10, one number per line. Just output the numbers."
            }
            Preset::Long => {
                "Write a detailed paragraph about Python programming. Include at least 5 \
                 sentences about its features, history, and popular use cases."
            }
            Preset::Throughput => {
                "Write a comprehensive technical article about REST APIs. Cover:
1. What is REST and its core principles
2. HTTP methods and status codes
3. Best practices for API design
4. Common authentication methods
5. Rate limiting and pagination
6. Error handling strategies
7. Versioning approaches
8. Testing methodologies

Be thorough and detailed in each section. Output as much content as possible."
            }
            Preset::Code => {
                "Write a complete, production-ready Python class that implements a thread-safe LRU cache with the following features:
1. Fixed capacity with automatic eviction of least recently used items
2. Thread-safe operations using proper locking
3. O(1) get and put operations
4. Configurable capacity via constructor
5. Clear method to empty the cache
6. Size method to return current item count
7. Comprehensive docstrings for all methods
8. Type hints throughout

Include thorough error handling and usage examples in the docstring.
Make the implementation robust and well-commented."
            }
            Preset::Json => {
                "Output valid JSON with fields: name=\"test\", value=123, active=true. No explanation."
            }
        }
    }
}

/// Renders the preset catalog for `--list-presets`.
pub fn describe_presets() -> String {
    let mut out = String::from("Available presets:\n");
    out.push_str(&"-".repeat(50));
    out.push('\n');
    for preset in Preset::ALL {
        out.push_str(&format!("  {:12} - {}\n", preset.key(), preset.name()));
        out.push_str(&format!("  {:12}   {}\n\n", "", preset.description()));
    }
    out
}
