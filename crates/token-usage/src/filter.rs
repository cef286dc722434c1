use std::sync::Arc;

use bytes::Bytes;
use config::TokenUsageConfig;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{
    clock::{Clock, SystemClock},
    context::RequestContext,
    error::FilterError,
    inject::transform_records,
    metrics::DerivedMetrics,
    real_ip::split_host,
    scope::ScopeMatcher,
    sse::{LineEndingNormalizer, SseNormalizer},
    usage::{OpenAiUsageExtractor, UsageExtractor},
};

/// Drives instrumentation for the requests of one host.
///
/// The filter holds no per-request state and is shared between all requests. Per-request state
/// lives in the [`RequestContext`] the host keeps alongside each request.
pub struct TokenUsageFilter {
    scope: ScopeMatcher,
    real_ip_header: Option<HeaderName>,
    extractor: Arc<dyn UsageExtractor>,
    normalizer: Arc<dyn SseNormalizer>,
    clock: Arc<dyn Clock>,
}

impl TokenUsageFilter {
    /// Creates a filter from configuration with the default collaborators.
    pub fn new(config: &TokenUsageConfig) -> Self {
        Self::builder(config).build()
    }

    /// Creates a builder to swap the usage extractor, normalizer or clock.
    pub fn builder(config: &TokenUsageConfig) -> TokenUsageFilterBuilder {
        TokenUsageFilterBuilder {
            scope: ScopeMatcher::with_suffixes(config.path_suffixes()),
            real_ip_header: config.real_ip_header(),
            extractor: Arc::new(OpenAiUsageExtractor),
            normalizer: Arc::new(LineEndingNormalizer),
            clock: Arc::new(SystemClock),
        }
    }

    /// The path gate of this filter.
    pub fn scope(&self) -> &ScopeMatcher {
        &self.scope
    }

    /// Handles the request headers.
    ///
    /// Returns `None` for requests outside the configured scope, which must then be left alone
    /// for the rest of their lifetime. For requests in scope, the real-IP header is written when
    /// configured and a fresh context is returned.
    pub fn on_request_headers(
        &self,
        target: &str,
        headers: &mut HeaderMap,
        remote_address: Option<&str>,
    ) -> Option<RequestContext> {
        if !self.scope.should_process(target) {
            return None;
        }

        if let Some(name) = &self.real_ip_header {
            write_real_ip(name, headers, remote_address);
        }

        Some(RequestContext::new(self.clock.now_millis()))
    }

    /// Handles one delivery of the response body and returns the bytes to send instead.
    ///
    /// Never fails: whenever the delivery cannot or need not be instrumented, `data` is
    /// returned as it came in.
    pub fn on_response_body(&self, context: Option<&mut RequestContext>, data: Bytes, end_of_stream: bool) -> Bytes {
        let Some(context) = context else {
            log::error!("on_response_body: {}", FilterError::MissingContext);
            return data;
        };

        if end_of_stream {
            log::debug!("on_response_body: final delivery of {} bytes", data.len());
        }

        match self.instrument(context, &data) {
            Ok(Some(rewritten)) => Bytes::from(rewritten),
            Ok(None) => data,
            Err(e) => {
                log::debug!("on_response_body: {e}, passing data through");
                data
            }
        }
    }

    fn instrument(&self, context: &mut RequestContext, data: &[u8]) -> Result<Option<Vec<u8>>, FilterError> {
        let now = self.clock.now_millis();

        if context.first_token().is_none() {
            let first_token = context.record_first_token(now);

            log::debug!(
                "on_response_body: first_token_time={}, time_to_first_token={}",
                first_token.time_ms,
                first_token.latency_ms
            );
        }

        let usage = self.extractor.extract(data);

        if usage.total_tokens == 0 {
            log::debug!("on_response_body: no token usage in delivery");
            return Ok(None);
        }

        log::debug!(
            "on_response_body: token usage total={}, output={}",
            usage.total_tokens,
            usage.output_tokens
        );

        let first_token = context
            .first_token()
            .filter(|first_token| first_token.time_ms != 0)
            .ok_or(FilterError::FirstTokenNotRecorded)?;

        let Some(metrics) = DerivedMetrics::compute(first_token, usage.output_tokens, now) else {
            log::debug!("on_response_body: zero output tokens, skipping metrics");
            return Ok(None);
        };

        log::debug!(
            "on_response_body: response_end_time={now}, time_to_first_token={}, time_per_output_token={}, tokens_per_second={}",
            metrics.time_to_first_token_ms,
            metrics.time_per_output_token_ms,
            metrics.tokens_per_second
        );

        let normalized = self.normalizer.normalize(data);

        Ok(Some(transform_records(&normalized, &metrics)))
    }
}

/// Builder for [`TokenUsageFilter`].
pub struct TokenUsageFilterBuilder {
    scope: ScopeMatcher,
    real_ip_header: Option<HeaderName>,
    extractor: Arc<dyn UsageExtractor>,
    normalizer: Arc<dyn SseNormalizer>,
    clock: Arc<dyn Clock>,
}

impl TokenUsageFilterBuilder {
    /// Replace the token usage extractor.
    pub fn extractor(mut self, extractor: Arc<dyn UsageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the event-stream normalizer.
    pub fn normalizer(mut self, normalizer: Arc<dyn SseNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the filter.
    pub fn build(self) -> TokenUsageFilter {
        TokenUsageFilter {
            scope: self.scope,
            real_ip_header: self.real_ip_header,
            extractor: self.extractor,
            normalizer: self.normalizer,
            clock: self.clock,
        }
    }
}

fn write_real_ip(name: &HeaderName, headers: &mut HeaderMap, remote_address: Option<&str>) {
    let Some(remote_address) = remote_address else {
        log::debug!("failed to get remote address, not writing {name}");
        return;
    };

    let host = split_host(remote_address).unwrap_or_default();

    match HeaderValue::from_str(host) {
        Ok(value) => {
            headers.insert(name.clone(), value);
        }
        Err(e) => log::debug!("cannot write {name} for remote address '{remote_address}': {e}"),
    }
}
