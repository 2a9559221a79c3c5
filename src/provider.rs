use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const AZURE_API_VERSION: &str = "2024-02-15-preview";

/// The API families the benchmark knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    AzureOpenAI,
    Gemini,
    Bedrock,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::AzureOpenAI => "Azure OpenAI",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::Bedrock => "AWS Bedrock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Endpoint description for a detected provider.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub headers: BTreeMap<String, String>,
}

impl ApiConfig {
    /// Detects the provider from the process environment.
    pub fn from_env() -> Option<Self> {
        Self::detect(|key| std::env::var(key).ok())
    }

    /// Detects the provider using `lookup` to resolve variables.
    ///
    /// Providers are checked in a fixed order (Anthropic, OpenAI, Azure
    /// OpenAI, Google Gemini, AWS Bedrock) and the first one with credentials
    /// present wins. Empty values count as unset.
    pub fn detect<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let first = |keys: &[&str]| keys.iter().copied().find_map(|key| var(key));

        if let Some(api_key) = first(&[
            "ANTHROPIC_API_KEY",
            "ANTHROPIC_API_KEY_DEV",
            "ANTHROPIC_AUTH_TOKEN",
        ]) {
            let base_url =
                var("ANTHROPIC_BASE_URL").unwrap_or_else(|| "https://api.anthropic.com".into());
            let model = first(&["ANTHROPIC_MODEL", "ANTHROPIC_DEFAULT_SONNET_MODEL"])
                .unwrap_or_else(|| "claude-sonnet-4-20250514".into());
            return Some(Self {
                provider: ProviderKind::Anthropic,
                endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
                model,
                headers: headers(&[
                    ("x-api-key", &api_key),
                    ("anthropic-version", ANTHROPIC_VERSION),
                    ("content-type", "application/json"),
                ]),
            });
        }

        if let Some(api_key) = var("OPENAI_API_KEY") {
            let base_url =
                var("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
            return Some(Self {
                provider: ProviderKind::OpenAI,
                endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
                model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".into()),
                headers: headers(&[
                    ("authorization", &format!("Bearer {}", api_key)),
                    ("content-type", "application/json"),
                ]),
            });
        }

        if let (Some(api_key), Some(endpoint), Some(deployment)) = (
            var("AZURE_OPENAI_API_KEY"),
            var("AZURE_OPENAI_ENDPOINT"),
            var("AZURE_OPENAI_DEPLOYMENT_NAME"),
        ) {
            return Some(Self {
                provider: ProviderKind::AzureOpenAI,
                endpoint: format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    endpoint.trim_end_matches('/'),
                    deployment,
                    AZURE_API_VERSION
                ),
                model: deployment,
                headers: headers(&[("api-key", &api_key), ("content-type", "application/json")]),
            });
        }

        if let Some(api_key) = var("GOOGLE_GENERATIVE_AI_API_KEY") {
            let base_url = var("GOOGLE_GENERATIVE_AI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into());
            let model =
                var("GOOGLE_GENERATIVE_AI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".into());
            return Some(Self {
                provider: ProviderKind::Gemini,
                endpoint: gemini_endpoint(base_url.trim_end_matches('/'), &model),
                model,
                headers: headers(&[
                    ("x-goog-api-key", &api_key),
                    ("content-type", "application/json"),
                ]),
            });
        }

        if var("AWS_ACCESS_KEY_ID").is_some() {
            return Some(Self {
                provider: ProviderKind::Bedrock,
                endpoint: "bedrock-runtime".into(),
                model: var("BEDROCK_MODEL")
                    .unwrap_or_else(|| "anthropic.claude-3-sonnet-20240229-v1:0".into()),
                headers: BTreeMap::new(),
            });
        }

        None
    }

    /// Replaces the model, rebuilding the endpoint where the model is part of the URL.
    pub fn with_model(mut self, model: &str) -> Self {
        if self.provider == ProviderKind::Gemini
            && let Some((base, _)) = self.endpoint.split_once("/v1beta/models/")
        {
            self.endpoint = gemini_endpoint(base, model);
        }
        self.model = model.to_string();
        self
    }
}

fn gemini_endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
        base_url, model
    )
}

fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// Request body types

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Messages(MessagesRequest),
    Gemini(GeminiRequest),
    Empty {},
}

/// Chat body shared by the Anthropic Messages and OpenAI Chat Completions APIs.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
}

/// Builds the provider-specific request body for `prompt` with streaming enabled.
///
/// Gemini has no body-level stream flag; streaming is selected by the
/// `streamGenerateContent` endpoint instead.
pub fn build_payload(config: &ApiConfig, prompt: &str, max_tokens: u32) -> Payload {
    match config.provider {
        ProviderKind::Anthropic | ProviderKind::OpenAI | ProviderKind::AzureOpenAI => {
            Payload::Messages(MessagesRequest {
                model: config.model.clone(),
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
                max_tokens,
                stream: true,
            })
        }
        ProviderKind::Gemini => Payload::Gemini(GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens,
            },
        }),
        ProviderKind::Bedrock => Payload::Empty {},
    }
}
