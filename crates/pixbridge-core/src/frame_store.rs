//! Double-buffered frame store.
//!
//! Two fixed pixel grids. The producer fills the slot named by
//! `active_write_slot` while the consumer reads the other one. Slot roles swap
//! on a frame boundary, in the producer's domain, after the last pixel of the
//! finished frame and before the first pixel of the next.
//!
//! The consumer learns about a swap by sampling the published write-slot
//! index through its own [`Synchronizer`], so its choice of read slot may lag
//! by the synchronizer depth. The swap is published with a Release store after
//! every pixel of the finished frame, so once the consumer's view moves it
//! sees that whole frame.
//!
//! Pixels are `AtomicU16` cells accessed with relaxed ordering. Inside the
//! staleness window the producer may already be writing the slot a lagging
//! consumer still reads; that is a visible glitch, never undefined behaviour.

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{CoreError, CoreResult};
use crate::frame_ready::FrameReadySender;
use crate::sync::{check_depth, Synchronizer};

/// Largest supported frame, in pixels per slot.
pub const MAX_FRAME_PIXELS: usize = 1 << 24;

/// Geometry and pixel format of a stored frame, after decimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Significant bits per pixel (1..=16). Wider input is masked.
    pub pixel_bits: u8,
    /// Value returned for reads outside the frame.
    pub blank: u16,
}

impl FrameFormat {
    /// 320x240, 16-bit pixels, blank = 0.
    pub const QVGA: Self = Self {
        width: 320,
        height: 240,
        pixel_bits: 16,
        blank: 0,
    };

    /// Pixels per slot.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Mask applied to every stored value.
    #[must_use]
    pub fn pixel_mask(&self) -> u16 {
        (((1u32 << self.pixel_bits) - 1) & 0xFFFF) as u16
    }

    /// Check dimensions and bit-width.
    pub fn validate(&self) -> CoreResult<()> {
        if self.width == 0 || self.height == 0 || self.pixel_count() > MAX_FRAME_PIXELS {
            return Err(CoreError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.pixel_bits == 0 || self.pixel_bits > 16 {
            return Err(CoreError::InvalidPixelBits {
                bits: self.pixel_bits,
            });
        }
        Ok(())
    }

    #[inline]
    fn linear_index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::QVGA
    }
}

struct Slots {
    grids: [Box<[AtomicU16]>; 2],
    /// Slot the producer is filling. Only the producer stores to this.
    active_write_slot: AtomicU32,
}

/// Two pixel grids plus the published write-slot index, not yet split.
pub struct FrameStore {
    shared: Arc<Slots>,
    format: FrameFormat,
    sync_stages: usize,
}

impl FrameStore {
    /// Allocate both slots, filled with the blank value.
    pub fn new(format: FrameFormat, sync_stages: usize) -> CoreResult<Self> {
        format.validate()?;
        check_depth(sync_stages)?;

        let grid = || -> Box<[AtomicU16]> {
            (0..format.pixel_count())
                .map(|_| AtomicU16::new(format.blank))
                .collect()
        };

        Ok(Self {
            shared: Arc::new(Slots {
                grids: [grid(), grid()],
                active_write_slot: AtomicU32::new(0),
            }),
            format,
            sync_stages,
        })
    }

    /// Frame format.
    #[must_use]
    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Hand out the writer (producer domain) and reader (consumer domain).
    ///
    /// The writer announces every completed frame on `ready`.
    #[must_use]
    pub fn split(self, ready: FrameReadySender) -> (FrameWriter, FrameReader) {
        let writer = FrameWriter {
            shared: Arc::clone(&self.shared),
            format: self.format,
            mask: self.format.pixel_mask(),
            write_slot: 0,
            capturing: false,
            boundary_level: false,
            frames_completed: 0,
            ready,
        };
        let reader = FrameReader {
            shared: self.shared,
            format: self.format,
            write_slot_sync: Synchronizer::new(self.sync_stages, 0),
        };
        (writer, reader)
    }
}

/// Producer end of the frame store.
pub struct FrameWriter {
    shared: Arc<Slots>,
    format: FrameFormat,
    mask: u16,
    write_slot: u32,
    capturing: bool,
    boundary_level: bool,
    frames_completed: u64,
    ready: FrameReadySender,
}

impl FrameWriter {
    /// Store one pixel into the current write slot.
    ///
    /// Invalid pixels and coordinates outside the frame are dropped.
    pub fn write_pixel(&mut self, x: u32, y: u32, value: u16, valid: bool) {
        if !valid {
            return;
        }
        let Some(idx) = self.format.linear_index(x, y) else {
            trace!(x, y, "pixel outside frame dropped");
            return;
        };
        self.shared.grids[self.write_slot as usize][idx].store(value & self.mask, Ordering::Relaxed);
    }

    /// Feed the frame-boundary level for this producer step.
    ///
    /// Call once per producer step. A rising edge ends the current frame: the
    /// first one only arms capture, every later one swaps the slots and pushes
    /// a frame-ready token. Returns `true` on a swap.
    pub fn on_frame_boundary(&mut self, level: bool) -> bool {
        let rising = level && !self.boundary_level;
        self.boundary_level = level;

        if !rising {
            self.ready.tick();
            return false;
        }

        if !self.capturing {
            self.capturing = true;
            self.ready.tick();
            debug!("first frame boundary, capture armed");
            return false;
        }

        self.write_slot ^= 1;
        self.shared
            .active_write_slot
            .store(self.write_slot, Ordering::Release);
        self.frames_completed += 1;

        if !self.ready.notify() {
            trace!(
                frame = self.frames_completed,
                "frame-ready token dropped, consumer behind"
            );
        }
        debug!(
            frame = self.frames_completed,
            write_slot = self.write_slot,
            "frame complete, slots swapped"
        );
        true
    }

    /// Slot currently being filled.
    #[must_use]
    pub fn active_write_slot(&self) -> u32 {
        self.write_slot
    }

    /// Frames completed (slot swaps) so far.
    #[must_use]
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// True once the first boundary has been seen.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Frame-ready tokens lost because the consumer fell behind.
    #[must_use]
    pub fn ready_tokens_dropped(&self) -> u64 {
        self.ready.dropped()
    }
}

/// Consumer end of the frame store.
pub struct FrameReader {
    shared: Arc<Slots>,
    format: FrameFormat,
    write_slot_sync: Synchronizer,
}

impl FrameReader {
    /// One consumer step: sample the producer's write-slot index.
    pub fn tick(&mut self) {
        let sample = self.shared.active_write_slot.load(Ordering::Acquire);
        self.write_slot_sync.clock(sample);
    }

    /// Slot the consumer reads from, as of its last step.
    #[must_use]
    pub fn active_read_slot(&self) -> u32 {
        1 - (self.write_slot_sync.output() & 1)
    }

    /// Pixel at `(x, y)` of the read slot, or the blank value outside the frame.
    #[must_use]
    pub fn read_pixel(&self, x: u32, y: u32) -> u16 {
        match self.format.linear_index(x, y) {
            Some(idx) => {
                self.shared.grids[self.active_read_slot() as usize][idx].load(Ordering::Relaxed)
            }
            None => self.format.blank,
        }
    }

    /// Copy of the whole read slot in row-major order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u16> {
        self.shared.grids[self.active_read_slot() as usize]
            .iter()
            .map(|px| px.load(Ordering::Relaxed))
            .collect()
    }

    /// Frame format.
    #[must_use]
    pub fn format(&self) -> FrameFormat {
        self.format
    }
}
