use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};

use axum::body::Body;
use bytes::Bytes;
use http_body::{Frame, SizeHint};
use token_usage::{RequestContext, TokenUsageFilter};

/// Response body that hands every data frame to the filter before passing it on.
///
/// Trailers and errors pass through untouched. The body owns the request context, so it is
/// dropped together with the response.
///
/// The filter sees the end of the stream exactly once: with the last data frame when the inner
/// body already reports its end there, otherwise as an empty delivery once the inner body is
/// exhausted.
pub(crate) struct InstrumentedBody {
    inner: Body,
    filter: Arc<TokenUsageFilter>,
    context: RequestContext,
    end_delivered: bool,
}

impl InstrumentedBody {
    pub(crate) fn new(inner: Body, filter: Arc<TokenUsageFilter>, context: RequestContext) -> Self {
        Self {
            inner,
            filter,
            context,
            end_delivered: false,
        }
    }

    fn deliver(&mut self, data: Bytes, end_of_stream: bool) -> Bytes {
        self.end_delivered |= end_of_stream;
        self.filter.on_response_body(Some(&mut self.context), data, end_of_stream)
    }

    /// Emits a data frame only if the filter turned the empty final delivery into bytes.
    fn finish(&mut self) -> Option<Bytes> {
        if self.end_delivered {
            return None;
        }

        Some(self.deliver(Bytes::new(), true)).filter(|data| !data.is_empty())
    }
}

impl http_body::Body for InstrumentedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;

        let frame = match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Poll::Ready(Some(Err(e))),
            None => return Poll::Ready(this.finish().map(|data| Ok(Frame::data(data)))),
        };

        let frame = match frame.into_data() {
            Ok(data) => {
                let end_of_stream = this.inner.is_end_stream();
                Frame::data(this.deliver(data, end_of_stream))
            }
            Err(frame) => frame,
        };

        Poll::Ready(Some(Ok(frame)))
    }

    fn is_end_stream(&self) -> bool {
        self.end_delivered && self.inner.is_end_stream()
    }

    // Rewritten frames change length, so only the lower bound of zero is known.
    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}
