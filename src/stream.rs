//! Response stream completion and fault classification.
//!
//! # Responsibilities
//! - Join the inner app's streaming with the adapter via a completion signal
//! - Classify terminal faults: system faults propagate, client aborts close
//!
//! # Design Decisions
//! - The outer runtime drives the body, so the join point is a body adapter
//! - Benign faults end the stream cleanly; no error reaches the outer side
//! - System faults are forwarded unchanged for the outer error path

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use thiserror::Error;
use tokio::sync::oneshot;

/// Classification of a terminal response-stream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// The peer went away; conventional flow-control territory.
    Benign,
    /// Anything else; the outer connection's error path must see it.
    System,
}

/// A classified stream failure, as reported on the completion channel.
#[derive(Debug, Error)]
#[error("sub-app response stream failed: {message}")]
pub struct StreamFault {
    pub class: FaultClass,
    pub message: String,
}

/// Terminal state of one monitored response stream.
#[derive(Debug)]
pub enum Completion {
    /// Every frame was delivered; the exchange is fully handled.
    Finished,
    /// The stream ended early without a system fault (client abort, or the
    /// outer side dropped the body).
    Closed,
    /// A system-level fault was propagated to the outer connection.
    Fault(StreamFault),
}

/// Decide whether a stream error belongs to the client-abort taxonomy or
/// is a genuine system fault. Walks the source chain so wrapped transport
/// errors are recognized wherever they sit.
pub fn classify(err: &axum::Error) -> FaultClass {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<std::io::Error>() {
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ) {
                return FaultClass::Benign;
            }
        }
        if let Some(hyper_err) = current.downcast_ref::<hyper::Error>() {
            if hyper_err.is_canceled() || hyper_err.is_incomplete_message() {
                return FaultClass::Benign;
            }
        }
        source = current.source();
    }
    FaultClass::System
}

/// Body adapter that forwards the inner app's frames and resolves the
/// completion channel exactly once, at the terminal state.
pub struct CompletionBody {
    inner: Body,
    signal: Option<oneshot::Sender<Completion>>,
}

impl CompletionBody {
    pub fn new(inner: Body, signal: oneshot::Sender<Completion>) -> Self {
        Self {
            inner,
            signal: Some(signal),
        }
    }

    fn resolve(&mut self, completion: Completion) {
        if let Some(tx) = self.signal.take() {
            let _ = tx.send(completion);
        }
    }
}

impl HttpBody for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(None) => {
                this.resolve(Completion::Finished);
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(err))) => match classify(&err) {
                FaultClass::Benign => {
                    tracing::debug!(error = %err, "Benign stream fault; closing response");
                    this.resolve(Completion::Closed);
                    Poll::Ready(None)
                }
                FaultClass::System => {
                    this.resolve(Completion::Fault(StreamFault {
                        class: FaultClass::System,
                        message: err.to_string(),
                    }));
                    Poll::Ready(Some(Err(err)))
                }
            },
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CompletionBody {
    fn drop(&mut self) {
        // Dropped before a terminal frame: the outer side abandoned the
        // stream early.
        self.resolve(Completion::Closed);
    }
}
