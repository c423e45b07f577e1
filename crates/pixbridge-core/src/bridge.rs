//! End-to-end assembly of the capture and display domains.
//!
//! ```text
//! pixel source ──► Decimator ──┬──► FrameWriter ═══ FrameStore ═══► FrameReader ──► read_pixel()
//!                              └──► QueueProducer ══ queue ══════► QueueConsumer ─► dequeue()
//!          frame_boundary ──► FrameWriter ══ frame-ready ═════► FrameReadyReceiver ► frame_ready()
//! ```
//!
//! [`CaptureSide`] lives in the producer's domain and [`DisplaySide`] in the
//! consumer's. Both are `Send`, neither is `Clone`.

use crate::decimator::Decimator;
use crate::error::CoreResult;
use crate::frame_ready::{frame_ready_channel, FrameReadyReceiver};
use crate::frame_store::{FrameFormat, FrameReader, FrameStore, FrameWriter};
use crate::queue::{ConsumerStats, CrossDomainQueue, ProducerStats, QueueConsumer, QueueProducer};
use crate::sync::DEFAULT_SYNC_STAGES;

/// Construction parameters, fixed for the lifetime of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Pixel queue capacity (power of two).
    pub queue_capacity: usize,
    /// Pending frame-ready tokens (power of two).
    pub frame_ready_capacity: usize,
    /// Synchronizer depth for every cross-domain observation.
    pub sync_stages: usize,
    /// Stored frame format, after decimation.
    pub format: FrameFormat,
    /// Subsampling factor in each axis.
    pub decimation_factor: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            frame_ready_capacity: 4,
            sync_stages: DEFAULT_SYNC_STAGES,
            format: FrameFormat::default(),
            decimation_factor: 2,
        }
    }
}

/// One pixel from the source, in input (pre-decimation) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelEvent {
    /// Input column.
    pub x: u32,
    /// Input row.
    pub y: u32,
    /// Raw pixel value.
    pub value: u16,
    /// False during blanking; invalid pixels are ignored.
    pub valid: bool,
}

/// Build both halves of the bridge.
pub fn bridge(settings: &BridgeSettings) -> CoreResult<(CaptureSide, DisplaySide)> {
    let decimator = Decimator::new(
        settings.decimation_factor,
        settings.format.width,
        settings.format.height,
    )?;
    let (pixel_tx, pixel_rx) =
        CrossDomainQueue::new(settings.queue_capacity, settings.sync_stages)?.split();
    let (ready_tx, ready_rx) =
        frame_ready_channel(settings.frame_ready_capacity, settings.sync_stages)?;
    let (writer, reader) = FrameStore::new(settings.format, settings.sync_stages)?.split(ready_tx);

    Ok((
        CaptureSide {
            decimator,
            writer,
            pixels: pixel_tx,
        },
        DisplaySide {
            reader,
            ready: ready_rx,
            pixels: pixel_rx,
        },
    ))
}

/// Producer-domain counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Input pixels forwarded by the decimator.
    pub decimated_kept: u64,
    /// Input pixels discarded by the decimator.
    pub decimated_dropped: u64,
    /// Pixel queue counters.
    pub queue: ProducerStats,
    /// Completed frames (slot swaps).
    pub frames_completed: u64,
    /// Frame-ready tokens lost to a stalled consumer.
    pub ready_tokens_dropped: u64,
}

/// Producer half: decimator, frame writer and pixel queue producer.
pub struct CaptureSide {
    decimator: Decimator,
    writer: FrameWriter,
    pixels: QueueProducer<u16>,
}

impl CaptureSide {
    /// One producer step.
    ///
    /// Invalid or decimated-away pixels still advance the step so the
    /// producer's view of the consumer keeps moving.
    pub fn clock(&mut self, event: PixelEvent, frame_boundary: bool) {
        let mapped = if event.valid {
            self.decimator.map(event.x, event.y)
        } else {
            None
        };

        match mapped {
            Some((x, y)) => {
                self.writer.write_pixel(x, y, event.value, true);
                self.pixels.write(event.value);
            }
            None => self.pixels.tick(),
        }

        self.writer.on_frame_boundary(frame_boundary);
    }

    /// Counters for this side.
    #[must_use]
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            decimated_kept: self.decimator.kept(),
            decimated_dropped: self.decimator.dropped(),
            queue: self.pixels.stats(),
            frames_completed: self.writer.frames_completed(),
            ready_tokens_dropped: self.writer.ready_tokens_dropped(),
        }
    }

    /// Input dimensions expected by the decimator.
    #[must_use]
    pub fn input_size(&self) -> (u32, u32) {
        self.decimator.input_size()
    }
}

/// Consumer-domain counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayStats {
    /// Frame-ready tokens popped.
    pub frames_observed: u64,
    /// Pixel queue counters.
    pub queue: ConsumerStats,
}

/// Consumer half: frame reader, frame-ready receiver and pixel queue consumer.
pub struct DisplaySide {
    reader: FrameReader,
    ready: FrameReadyReceiver,
    pixels: QueueConsumer<u16>,
}

impl DisplaySide {
    /// One consumer step for the frame path. Returns `true` when a new
    /// frame-ready token arrived on this step.
    pub fn step(&mut self) -> bool {
        // The token is sampled before the slot index, so by the time the token
        // is visible the slot view is at least as new as the frame it announces.
        let arrived = self.ready.poll();
        self.reader.tick();
        arrived
    }

    /// Pixel of the most recently completed frame, blank outside the frame.
    #[must_use]
    pub fn read_pixel(&self, x: u32, y: u32) -> u16 {
        self.reader.read_pixel(x, y)
    }

    /// Whole read slot, row-major.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u16> {
        self.reader.snapshot()
    }

    /// Slot currently exposed for reading.
    #[must_use]
    pub fn active_read_slot(&self) -> u32 {
        self.reader.active_read_slot()
    }

    /// Latched frame-ready state.
    #[must_use]
    pub fn frame_ready(&self) -> bool {
        self.ready.frame_ready()
    }

    /// Clear the latched frame-ready state.
    pub fn acknowledge(&mut self) {
        self.ready.acknowledge();
    }

    /// One consumer step for the streaming path: next pixel in arrival order.
    pub fn dequeue(&mut self) -> Option<u16> {
        self.pixels.read()
    }

    /// Pixels visible in the queue as of the last dequeue step.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.pixels.occupancy()
    }

    /// Stored frame format.
    #[must_use]
    pub fn format(&self) -> FrameFormat {
        self.reader.format()
    }

    /// Counters for this side.
    #[must_use]
    pub fn stats(&self) -> DisplayStats {
        DisplayStats {
            frames_observed: self.ready.frames_observed(),
            queue: self.pixels.stats(),
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    fn settings(width: u32, height: u32) -> BridgeSettings {
        BridgeSettings {
            queue_capacity: 64,
            format: FrameFormat {
                width,
                height,
                pixel_bits: 16,
                blank: 0,
            },
            ..Default::default()
        }
    }

    fn raster(capture: &mut CaptureSide, value: impl Fn(u32, u32) -> u16) {
        let (w, h) = capture.input_size();
        for y in 0..h {
            for x in 0..w {
                capture.clock(
                    PixelEvent {
                        x,
                        y,
                        value: value(x, y),
                        valid: true,
                    },
                    false,
                );
            }
        }
    }

    fn vsync(capture: &mut CaptureSide) {
        capture.clock(PixelEvent::default(), true);
        capture.clock(PixelEvent::default(), false);
    }

    #[test]
    fn decimated_frame_lands_at_half_coordinates() {
        let (mut capture, mut display) = bridge(&settings(4, 4)).unwrap();
        vsync(&mut capture);
        raster(&mut capture, |x, y| (y * 100 + x) as u16);
        vsync(&mut capture);

        while !display.step() {}
        display.step();

        for b in 0..4 {
            for a in 0..4 {
                assert_eq!(display.read_pixel(a, b), (2 * b * 100 + 2 * a) as u16);
            }
        }
    }

    #[test]
    fn odd_input_never_reaches_the_store() {
        let (mut capture, mut display) = bridge(&settings(2, 2)).unwrap();
        vsync(&mut capture);
        raster(&mut capture, |x, y| if x % 2 == 1 || y % 2 == 1 { 0xDEAD } else { 7 });
        vsync(&mut capture);
        while !display.step() {}
        display.step();
        assert_eq!(display.snapshot(), vec![7; 4]);
    }

    #[test]
    fn streaming_path_preserves_arrival_order() {
        let (mut capture, mut display) = bridge(&settings(4, 4)).unwrap();
        raster(&mut capture, |x, y| (y * 8 + x) as u16);

        let mut seen = Vec::new();
        for _ in 0..64 {
            if let Some(v) = display.dequeue() {
                seen.push(v);
            }
        }
        let expected: Vec<u16> = (0..8u32)
            .step_by(2)
            .flat_map(|y| (0..8u32).step_by(2).map(move |x| (y * 8 + x) as u16))
            .collect();
        assert_eq!(seen, expected);
        assert_eq!(capture.stats().decimated_kept, 16);
        assert_eq!(capture.stats().decimated_dropped, 48);
        assert_eq!(display.stats().queue.delivered, 16);
    }

    #[test]
    fn invalid_settings_fail_construction() {
        let mut bad = settings(4, 4);
        bad.queue_capacity = 100;
        assert!(bridge(&bad).is_err());

        let mut bad = settings(4, 4);
        bad.decimation_factor = 0;
        assert!(bridge(&bad).is_err());
    }
}
