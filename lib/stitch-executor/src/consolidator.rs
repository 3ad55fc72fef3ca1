use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use futures::stream::{BoxStream, SelectAll, Stream};

use crate::response::IncrementalPayload;

/// Per-item hook: transform a payload, or drop it by returning `None`.
pub type PayloadProcessor = Box<dyn FnMut(IncrementalPayload) -> Option<IncrementalPayload> + Send>;

/// Fair fan-in over a dynamic set of incremental-payload streams.
///
/// Sources can be added any time before [`close`](Consolidator::close); order
/// within one source is preserved, interleaving across sources is not
/// specified. Once closed and drained, a terminal `hasNext: false` payload is
/// emitted and the stream ends. Dropping the consolidator drops every wrapped
/// source, which is how consumer-side cancellation propagates.
pub struct Consolidator {
    sources: SelectAll<BoxStream<'static, IncrementalPayload>>,
    processor: Option<PayloadProcessor>,
    closed: bool,
    finished: bool,
    waker: Option<Waker>,
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Consolidator {
    pub fn new() -> Self {
        Consolidator {
            sources: SelectAll::new(),
            processor: None,
            closed: false,
            finished: false,
            waker: None,
        }
    }

    pub fn with_processor(processor: PayloadProcessor) -> Self {
        Consolidator {
            processor: Some(processor),
            ..Self::new()
        }
    }

    /// Ignored after `close`; a closed consolidator's source set is final.
    pub fn add_source(&mut self, source: BoxStream<'static, IncrementalPayload>) {
        if self.closed {
            return;
        }
        self.sources.push(source);
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

impl Stream for Consolidator {
    type Item = IncrementalPayload;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        loop {
            match Pin::new(&mut this.sources).poll_next(cx) {
                Poll::Ready(Some(payload)) => {
                    let processed = match &mut this.processor {
                        Some(processor) => processor(payload),
                        None => Some(payload),
                    };
                    match processed {
                        Some(mut payload) => {
                            // Only the terminal payload may say the stream is
                            // done; a source's own final flag is not ours.
                            payload.has_next = true;
                            return Poll::Ready(Some(payload));
                        }
                        None => continue,
                    }
                }
                Poll::Ready(None) => {
                    if this.closed {
                        this.finished = true;
                        return Poll::Ready(Some(IncrementalPayload {
                            incremental: None,
                            has_next: false,
                            extensions: None,
                        }));
                    }
                    this.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
