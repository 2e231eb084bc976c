//! Streaming response body over a buffer chain
//!
//! Each buffer's valid range becomes one data frame, emitted in chain
//! order. The stream ends only after the frame of a buffer carrying the
//! terminal flag; a chain that was never terminated keeps the response
//! open, and an early terminal flag truncates it.

use crate::buf::{Buf, Chain};
use hyper::body::{Body, Bytes, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

pub struct ChainBody {
    chain: Chain,
    done: bool,
}

impl ChainBody {
    pub const fn new(chain: Chain) -> Self {
        Self { chain, done: false }
    }

    /// A body that is already at end of stream.
    pub const fn empty() -> Self {
        Self {
            chain: Chain::new(),
            done: true,
        }
    }

    /// Bytes not yet handed to the connection.
    pub fn remaining(&self) -> usize {
        self.chain.total_len()
    }
}

impl Body for ChainBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.chain.pop_front() {
            Some(buf) => {
                if buf.last {
                    this.done = true;
                }
                let Buf {
                    data, start, end, ..
                } = buf;
                let bytes = Bytes::from(data).slice(start..end);
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            // No terminal buffer was submitted: the response stays open.
            None => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }

    fn size_hint(&self) -> SizeHint {
        let remaining = self.remaining() as u64;
        if self.done || self.chain.is_terminated() {
            SizeHint::with_exact(remaining)
        } else {
            let mut hint = SizeHint::new();
            hint.set_lower(remaining);
            hint
        }
    }
}
