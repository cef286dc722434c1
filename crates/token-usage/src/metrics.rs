use crate::context::FirstToken;

/// Latency and throughput numbers injected into a usage record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    /// Milliseconds from request start to the first response bytes.
    pub time_to_first_token_ms: i64,
    /// Milliseconds of generation per output token, rounded down.
    pub time_per_output_token_ms: i64,
    /// Output tokens per second of generation, zero when no time has elapsed.
    pub tokens_per_second: f64,
}

impl DerivedMetrics {
    /// Computes the metrics for a response whose usage was seen at `response_end_ms`.
    ///
    /// Returns `None` when `output_tokens` is zero, since there is nothing to divide by.
    pub fn compute(first_token: FirstToken, output_tokens: u64, response_end_ms: i64) -> Option<Self> {
        if output_tokens == 0 {
            return None;
        }

        let output_token_duration = response_end_ms - first_token.time_ms;
        let output_tokens_i64 = i64::try_from(output_tokens).unwrap_or(i64::MAX);

        let tokens_per_second = if output_token_duration > 0 {
            output_tokens as f64 / (output_token_duration as f64 / 1000.0)
        } else {
            0.0
        };

        Some(Self {
            time_to_first_token_ms: first_token.latency_ms,
            time_per_output_token_ms: output_token_duration.div_euclid(output_tokens_i64),
            tokens_per_second,
        })
    }
}
