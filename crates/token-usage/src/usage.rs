use serde::Deserialize;

use crate::{
    json,
    sse::{LineEndingNormalizer, SseNormalizer, StreamRecord, split_records},
};

/// Member holding the token counts of a response.
pub(crate) const USAGE_FIELD: &str = "usage";

/// Token counts reported by the model for a response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt plus completion tokens. Zero means no usage was found.
    pub total_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
}

/// Reads token counts out of one response body delivery.
///
/// Implementations must tolerate partial records and non-JSON content by returning
/// [`TokenUsage::default`].
pub trait UsageExtractor: Send + Sync {
    /// Token usage found in `data`, or zero usage.
    fn extract(&self, data: &[u8]) -> TokenUsage;
}

/// Extracts usage from OpenAI-compatible event streams and JSON bodies.
///
/// Understands `usage` at the top level (Chat Completions, Completions, Embeddings), under
/// `response` (Responses API `response.completed`) and under `message` (Anthropic
/// `message_start`). Both `prompt_tokens`/`completion_tokens` and
/// `input_tokens`/`output_tokens` naming is accepted. When a delivery holds several usage
/// records the last one wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiUsageExtractor;

impl UsageExtractor for OpenAiUsageExtractor {
    fn extract(&self, data: &[u8]) -> TokenUsage {
        let data = LineEndingNormalizer.normalize(data);

        split_records(&data)
            .filter(|raw| contains(raw, b"_tokens"))
            .filter_map(|raw| parse_usage(StreamRecord::parse(raw).payload()))
            .last()
            .unwrap_or_default()
    }
}

/// Whether a record payload carries a `usage` member at its top level.
pub(crate) fn is_usage_record(payload: &[u8]) -> bool {
    json::get(payload, &[USAGE_FIELD]).is_some()
}

// Each location is parsed on its own, so an unrelated `message` string or `response` array
// does not hide a top-level usage object.
#[derive(Debug, Deserialize)]
struct TopLevel {
    usage: Option<UsageFields>,
}

#[derive(Debug, Deserialize)]
struct InResponse {
    response: TopLevel,
}

#[derive(Debug, Deserialize)]
struct InMessage {
    message: TopLevel,
}

#[derive(Debug, Default, Deserialize)]
struct UsageFields {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl From<UsageFields> for TokenUsage {
    fn from(fields: UsageFields) -> Self {
        let input = fields.prompt_tokens.or(fields.input_tokens).unwrap_or(0);
        let output = fields.completion_tokens.or(fields.output_tokens).unwrap_or(0);

        TokenUsage {
            total_tokens: fields.total_tokens.unwrap_or_else(|| input.saturating_add(output)),
            output_tokens: output,
        }
    }
}

fn parse_usage(payload: &[u8]) -> Option<TokenUsage> {
    sonic_rs::from_slice::<TopLevel>(payload)
        .ok()
        .and_then(|top| top.usage)
        .or_else(|| sonic_rs::from_slice::<InResponse>(payload).ok()?.response.usage)
        .or_else(|| sonic_rs::from_slice::<InMessage>(payload).ok()?.message.usage)
        .map(TokenUsage::from)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
