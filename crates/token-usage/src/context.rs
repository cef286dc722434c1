/// Timing state of one instrumented request.
///
/// Created when the request headers are processed and dropped together with the request.
/// Every field is written at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    start_time_ms: i64,
    first_token: Option<FirstToken>,
}

/// Moment the first response bytes arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstToken {
    /// Wall-clock time of the first body delivery, in milliseconds.
    pub time_ms: i64,
    /// `time_ms` minus the request start time.
    pub latency_ms: i64,
}

impl RequestContext {
    /// Starts tracking a request that began at `start_time_ms`.
    pub fn new(start_time_ms: i64) -> Self {
        Self {
            start_time_ms,
            first_token: None,
        }
    }

    /// Time the request headers were processed.
    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    /// First token timing, if any body has been delivered yet.
    pub fn first_token(&self) -> Option<FirstToken> {
        self.first_token
    }

    /// Records the first token at `now_ms` unless one is already recorded.
    ///
    /// Returns the recorded value, which is the earlier one on every call after the first.
    pub fn record_first_token(&mut self, now_ms: i64) -> FirstToken {
        let start_time_ms = self.start_time_ms;

        *self.first_token.get_or_insert_with(|| FirstToken {
            time_ms: now_ms,
            latency_ms: now_ms - start_time_ms,
        })
    }
}
