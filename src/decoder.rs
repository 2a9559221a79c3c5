use serde::Deserialize;

use crate::provider::ProviderKind;
use crate::tokenizer::estimate_tokens;

/// Payload of the event-stream terminator line.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

// Anthropic Messages streaming events. Only `content_block_delta` carries
// `delta.text`; other events either lack `delta` or carry a different shape.
#[derive(Debug, Deserialize)]
struct AnthropicEvent {
    delta: Option<AnthropicDelta>,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    text: Option<String>,
}

// OpenAI Chat Completions chunk, trimmed to the fields we read.
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Estimates the output tokens contained in a fully accumulated stream body.
///
/// The whole buffer is scanned once after the stream ends, since network
/// chunks do not line up with event boundaries. Lines that fail to decode are
/// skipped without affecting the tokens already counted.
pub fn decode_tokens(text: &str, provider: ProviderKind) -> u64 {
    match provider {
        ProviderKind::Anthropic => data_payloads(text)
            .filter_map(|data| serde_json::from_str::<AnthropicEvent>(data).ok())
            .filter_map(|event| event.delta.and_then(|delta| delta.text))
            .map(|text| estimate_tokens(&text))
            .sum(),
        ProviderKind::OpenAI | ProviderKind::AzureOpenAI => data_payloads(text)
            .filter_map(|data| serde_json::from_str::<ChatCompletionChunk>(data).ok())
            .filter_map(|chunk| {
                chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta)
                    .and_then(|delta| delta.content)
            })
            .map(|content| estimate_tokens(&content))
            .sum(),
        ProviderKind::Gemini | ProviderKind::Bedrock => estimate_tokens(text),
    }
}

/// Iterates the payloads of `data:` lines, skipping empty ones and the terminator.
fn data_payloads(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .filter(|data| !data.is_empty() && *data != DONE_SENTINEL)
}
