use crate::{
    error::SetFieldError,
    json,
    metrics::DerivedMetrics,
    sse::{StreamRecord, join_records, split_records},
    usage::{USAGE_FIELD, is_usage_record},
};

const TIME_TO_FIRST_TOKEN_MS: &str = "time_to_first_token_ms";
const TIME_PER_OUTPUT_TOKEN_MS: &str = "time_per_output_token_ms";
const TOKENS_PER_SECOND: &str = "tokens_per_second";

/// Writes the three metrics into the `usage` object of one JSON payload.
///
/// Each field is set independently: a field that cannot be written is logged and skipped, and
/// the others are still attempted. Writing the same metrics twice produces identical bytes.
pub fn inject_metrics(payload: &[u8], metrics: &DerivedMetrics) -> Vec<u8> {
    let fields = [
        (TIME_TO_FIRST_TOKEN_MS, Ok(metrics.time_to_first_token_ms.to_string())),
        (TIME_PER_OUTPUT_TOKEN_MS, Ok(metrics.time_per_output_token_ms.to_string())),
        (TOKENS_PER_SECOND, float(TOKENS_PER_SECOND, metrics.tokens_per_second)),
    ];

    let mut output = payload.to_vec();

    for (field, value) in fields {
        let result = value.and_then(|value| json::set(&output, &[USAGE_FIELD, field], &value));

        match result {
            Ok(updated) => output = updated,
            Err(e) => log::debug!("skipping usage.{field}: {e}"),
        }
    }

    output
}

/// Rewrites every usage record of normalized stream data, leaving other records untouched.
///
/// Records are split on the canonical delimiter, usage records get the metrics injected and are
/// re-framed the way they arrived, and everything is joined back in the original order.
pub fn transform_records(data: &[u8], metrics: &DerivedMetrics) -> Vec<u8> {
    let records = split_records(data).map(|raw| {
        let record = StreamRecord::parse(raw);

        if !is_usage_record(record.payload()) {
            return raw.to_vec();
        }

        log::debug!("injecting metrics into usage record: {}", String::from_utf8_lossy(raw));
        record.reframe(&inject_metrics(record.payload(), metrics))
    });

    join_records(records)
}

/// Serializes a float so it always reads back as one, `7.0` rather than `7`.
fn float(field: &'static str, value: f64) -> Result<String, SetFieldError> {
    serde_json::Number::from_f64(value)
        .map(|number| number.to_string())
        .ok_or(SetFieldError::InvalidValue { field })
}
