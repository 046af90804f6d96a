//! Response body bounded by the backend's deadline.
//!
//! The backend timeout covers the whole exchange, not just the response
//! head. Once the deadline passes the stream ends with an error, which
//! aborts the response towards the client, and the expiry hook runs once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::BoxError;
use hyper::body::{Body, Frame, SizeHint};
use tokio::time::{sleep_until, Instant, Sleep};

/// The backend did not finish the body in time.
#[derive(Debug, thiserror::Error)]
#[error("backend response exceeded its deadline")]
pub struct DeadlineExceeded;

type ExpiryHook = Box<dyn FnOnce() + Send>;

pub struct DeadlineBody<B> {
    inner: Pin<Box<B>>,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
    on_expired: Option<ExpiryHook>,
}

impl<B> DeadlineBody<B> {
    pub fn new(inner: B, deadline: Instant) -> Self {
        Self {
            inner: Box::pin(inner),
            deadline: Box::pin(sleep_until(deadline)),
            expired: false,
            on_expired: None,
        }
    }

    /// Run `hook` when the deadline cuts the stream short.
    pub fn on_expired(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_expired = Some(Box::new(hook));
        self
    }
}

impl<B> Body for DeadlineBody<B>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    type Data = B::Data;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(frame) => Poll::Ready(frame.map(|f| f.map_err(Into::into))),
            Poll::Pending => {
                if this.deadline.as_mut().poll(cx).is_ready() {
                    this.expired = true;
                    if let Some(hook) = this.on_expired.take() {
                        hook();
                    }
                    Poll::Ready(Some(Err(DeadlineExceeded.into())))
                } else {
                    Poll::Pending
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
