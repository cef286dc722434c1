//! Streaming token-usage instrumentation.
//!
//! Observes an in-flight LLM request and its streamed response, measures time to first token,
//! time per output token and tokens per second, and writes those three numbers into the `usage`
//! object of the event stream without touching any other byte of the payload.
//!
//! The host owns the request lifecycle. It calls [`TokenUsageFilter::on_request_headers`] once
//! per request, keeps the returned [`RequestContext`] next to the request, and hands every
//! response body delivery to [`TokenUsageFilter::on_response_body`].

#![deny(missing_docs)]

mod clock;
mod context;
mod error;
mod filter;
mod inject;
mod json;
mod metrics;
mod real_ip;
mod scope;
mod sse;
mod usage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{FirstToken, RequestContext};
pub use error::{FilterError, SetFieldError};
pub use filter::{TokenUsageFilter, TokenUsageFilterBuilder};
pub use inject::{inject_metrics, transform_records};
pub use metrics::DerivedMetrics;
pub use real_ip::split_host;
pub use scope::{DEFAULT_PATH_SUFFIXES, ScopeMatcher};
pub use sse::{
    DATA_PREFIX, LineEndingNormalizer, RECORD_DELIMITER, Records, SseNormalizer, StreamRecord, join_records, split_records,
};
pub use usage::{OpenAiUsageExtractor, TokenUsage, UsageExtractor};
