//! Frame-ready notification channel.
//!
//! A [`CrossDomainQueue`] of unit tokens, kept apart from the pixel queue so a
//! notification can never be reordered behind pixel payload. The producer
//! pushes one token per completed frame; the consumer pops at most one token
//! per observation and latches a "frame ready" state.

use crate::error::CoreResult;
use crate::queue::{CrossDomainQueue, QueueConsumer, QueueProducer};

/// Create a frame-ready channel with room for `capacity` pending tokens.
pub fn frame_ready_channel(
    capacity: usize,
    sync_stages: usize,
) -> CoreResult<(FrameReadySender, FrameReadyReceiver)> {
    let (tx, rx) = CrossDomainQueue::<()>::new(capacity, sync_stages)?.split();
    Ok((
        FrameReadySender { tx },
        FrameReadyReceiver {
            rx,
            latched: false,
            frames_observed: 0,
        },
    ))
}

/// Producer end, owned by the frame writer.
pub struct FrameReadySender {
    tx: QueueProducer<()>,
}

impl FrameReadySender {
    /// One producer step that pushes a token. `false` if it was dropped.
    pub fn notify(&mut self) -> bool {
        self.tx.write(())
    }

    /// Idle producer step.
    pub fn tick(&mut self) {
        self.tx.tick();
    }

    /// Tokens dropped because the consumer fell behind.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.tx.stats().dropped
    }
}

/// Consumer end with a latched ready flag.
pub struct FrameReadyReceiver {
    rx: QueueConsumer<()>,
    latched: bool,
    frames_observed: u64,
}

impl FrameReadyReceiver {
    /// One consumer step. Pops at most one token and returns whether one
    /// arrived on this step.
    pub fn poll(&mut self) -> bool {
        if self.rx.read().is_none() {
            return false;
        }
        self.latched = true;
        self.frames_observed += 1;
        true
    }

    /// True once any frame has been announced, until [`acknowledge`] clears it.
    ///
    /// [`acknowledge`]: FrameReadyReceiver::acknowledge
    #[must_use]
    pub fn frame_ready(&self) -> bool {
        self.latched
    }

    /// Clear the latch, for consumers that want one edge per frame.
    pub fn acknowledge(&mut self) {
        self.latched = false;
    }

    /// Tokens popped so far.
    #[must_use]
    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }
}
