//! Two clock domains driven by independent tokio timers.
//!
//! The capture task wakes on one period and runs a burst of producer steps
//! fed by a [`TestPatternSource`]; the display task wakes on an unrelated
//! period and runs its own burst, draining the pixel queue and checking each
//! announced frame. The only things the tasks share are the transport halves'
//! internal atomics and a completion flag.
//!
//! # Example
//! ```
//! use pixbridge::config::BridgeConfig;
//! use pixbridge::simulation;
//!
//! let mut config = BridgeConfig::default();
//! config.frame.width = 16;
//! config.frame.height = 12;
//! config.simulation.frames = 2;
//! config.simulation.producer_period_us = 100;
//! config.simulation.consumer_period_us = 170;
//!
//! let report = tokio_test::block_on(simulation::run(&config))?;
//! assert!(report.frames_published >= 2);
//! assert_eq!(report.pixels_dequeued, report.capture.queue.accepted);
//! # Ok::<(), pixbridge::error::BridgeError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pixbridge_core::{bridge, CaptureSide, CaptureStats, DisplaySide, DisplayStats};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{BridgeConfig, SimulationConfig};
use crate::error::{AppResult, BridgeError};
use crate::source::{ramp_of, tag_of, TestPatternSource, TAG_BITS};

/// Outcome of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Frames the capture side completed.
    pub frames_published: u64,
    /// Frame-ready tokens the display side received.
    pub frames_observed: u64,
    /// Frames announced after the one the display last saw, but never seen.
    pub frames_skipped: u64,
    /// Tokens whose snapshot showed the same tag as the previous one.
    pub frames_repeated: u64,
    /// Snapshots mixing pixels from more than one frame.
    pub torn_snapshots: u64,
    /// Pixels taken off the streaming queue.
    pub pixels_dequeued: u64,
    /// Dequeued pixels that arrived before one emitted earlier.
    pub stream_out_of_order: u64,
    /// Producer counters at shutdown.
    pub capture: CaptureStats,
    /// Consumer counters after the drain.
    pub display: DisplayStats,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Every pixel the queue accepted was delivered, in full.
    #[must_use]
    pub fn queue_drained(&self) -> bool {
        self.capture.queue.accepted == self.display.queue.delivered
            && self.pixels_dequeued == self.display.queue.delivered
    }
}

/// Tracks tags of announced frames, like a camera's frame-number check.
#[derive(Debug, Default)]
struct FrameCheck {
    pixel_bits: u8,
    last_tag: Option<u8>,
    skipped: u64,
    repeated: u64,
    torn: u64,
}

impl FrameCheck {
    fn new(pixel_bits: u8) -> Self {
        Self {
            pixel_bits,
            ..Default::default()
        }
    }

    fn inspect(&mut self, frame: &[u16]) {
        let Some(&first) = frame.first() else {
            return;
        };
        let tag = tag_of(first, self.pixel_bits);
        if frame.iter().any(|&v| tag_of(v, self.pixel_bits) != tag) {
            self.torn += 1;
            debug!(tag, "snapshot mixes frames");
            return;
        }

        if let Some(last) = self.last_tag {
            let modulus = 1u8 << TAG_BITS;
            let expected = (last + 1) % modulus;
            if tag == last {
                self.repeated += 1;
            } else if tag != expected {
                let gap = (tag + modulus - expected) % modulus;
                self.skipped += u64::from(gap);
                warn!(
                    "Frame discontinuity: expected tag {}, got {} (skipped {} frames)",
                    expected, tag, gap
                );
            }
        }
        self.last_tag = Some(tag);
    }
}

/// Checks that streamed pixels arrive in emission order.
///
/// Within a frame the ramp under the tag never decreases. Across frames the
/// tag must move forward; tags are compared as serial numbers, so a jump of
/// half the tag cycle or more reads as going backwards.
#[derive(Debug, Default)]
struct StreamCheck {
    pixel_bits: u8,
    last: Option<(u8, u16)>,
    received: u64,
    out_of_order: u64,
}

impl StreamCheck {
    fn new(pixel_bits: u8) -> Self {
        Self {
            pixel_bits,
            ..Default::default()
        }
    }

    fn observe(&mut self, value: u16) {
        let tag = tag_of(value, self.pixel_bits);
        let ramp = ramp_of(value, self.pixel_bits);
        self.received += 1;

        if let Some((last_tag, last_ramp)) = self.last {
            let modulus = 1u8 << TAG_BITS;
            let ahead = (tag + modulus - last_tag) % modulus;
            let in_order = if ahead == 0 {
                ramp >= last_ramp
            } else {
                ahead < modulus / 2
            };
            if !in_order {
                self.out_of_order += 1;
                warn!(
                    "Stream out of order: tag {} ramp {} after tag {} ramp {}",
                    tag, ramp, last_tag, last_ramp
                );
            }
        }
        self.last = Some((tag, ramp));
    }
}

/// Run both domains until `simulation.frames` frames are published and the
/// display side has drained everything in flight.
pub async fn run(config: &BridgeConfig) -> AppResult<SimulationReport> {
    config.validate()?;
    let (capture, display) = bridge(&config.bridge_settings())?;
    let done = Arc::new(AtomicBool::new(false));
    let started = Instant::now();

    info!(
        width = config.frame.width,
        height = config.frame.height,
        factor = config.decimation.factor,
        capacity = config.queue.capacity,
        sync_stages = config.queue.sync_stages,
        "starting clock domains"
    );

    let producer = tokio::spawn(capture_domain(
        capture,
        config.simulation.clone(),
        config.frame.pixel_bits,
        Arc::clone(&done),
    ));
    let consumer = tokio::spawn(display_domain(
        display,
        config.simulation.clone(),
        config.frame.pixel_bits,
        config.queue.sync_stages,
        Arc::clone(&done),
    ));

    let (capture, (display, check, stream)) = tokio::try_join!(producer, consumer)
        .map_err(|e| BridgeError::Simulation(format!("clock domain task failed: {e}")))?;

    let report = SimulationReport {
        frames_published: capture.frames_completed,
        frames_observed: display.frames_observed,
        frames_skipped: check.skipped,
        frames_repeated: check.repeated,
        torn_snapshots: check.torn,
        pixels_dequeued: stream.received,
        stream_out_of_order: stream.out_of_order,
        capture,
        display,
        elapsed: started.elapsed(),
    };

    info!(
        published = report.frames_published,
        observed = report.frames_observed,
        skipped = report.frames_skipped,
        torn = report.torn_snapshots,
        out_of_order = report.stream_out_of_order,
        pixels_dropped = report.capture.queue.dropped,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "simulation finished"
    );
    Ok(report)
}

async fn capture_domain(
    mut capture: CaptureSide,
    sim: SimulationConfig,
    pixel_bits: u8,
    done: Arc<AtomicBool>,
) -> CaptureStats {
    let (width, height) = capture.input_size();
    let mut source = TestPatternSource::new(width, height, sim.vblank_lines, pixel_bits);
    let mut ticker = interval(sim.producer_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'outer: loop {
        ticker.tick().await;
        for _ in 0..sim.producer_steps {
            let (event, boundary) = source.next_event();
            capture.clock(event, boundary);
            if capture.stats().frames_completed >= sim.frames {
                break 'outer;
            }
        }
    }

    let stats = capture.stats();
    debug!(
        frames = stats.frames_completed,
        accepted = stats.queue.accepted,
        dropped = stats.queue.dropped,
        "capture domain stopped"
    );
    done.store(true, Ordering::Release);
    stats
}

async fn display_domain(
    mut display: DisplaySide,
    sim: SimulationConfig,
    pixel_bits: u8,
    sync_stages: usize,
    done: Arc<AtomicBool>,
) -> (DisplayStats, FrameCheck, StreamCheck) {
    let mut check = FrameCheck::new(pixel_bits);
    let mut stream = StreamCheck::new(pixel_bits);
    let mut ticker = interval(sim.consumer_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut step = |display: &mut DisplaySide| -> bool {
        let mut busy = false;
        if display.step() {
            check.inspect(&display.snapshot());
            busy = true;
        }
        if let Some(value) = display.dequeue() {
            stream.observe(value);
            busy = true;
        }
        busy
    };

    loop {
        ticker.tick().await;
        if done.load(Ordering::Acquire) {
            // Producer is quiet: everything it published becomes visible
            // within the synchronizer depth.
            let mut quiet = 0;
            while quiet <= sync_stages + 1 {
                if step(&mut display) {
                    quiet = 0;
                } else {
                    quiet += 1;
                }
            }
            break;
        }
        for _ in 0..sim.consumer_steps {
            step(&mut display);
        }
    }

    let stats = display.stats();
    debug!(
        frames = stats.frames_observed,
        delivered = stats.queue.delivered,
        "display domain drained"
    );
    (stats, check, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn small_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.frame.width = 8;
        config.frame.height = 6;
        config.queue.capacity = 64;
        config.simulation.frames = 3;
        config.simulation.vblank_lines = 2;
        config.simulation.producer_period_us = 100;
        config.simulation.producer_steps = 64;
        config.simulation.consumer_period_us = 230;
        config.simulation.consumer_steps = 48;
        config
    }

    fn frame_of(tag: u16, len: usize) -> Vec<u16> {
        vec![(tag << 12) | 0x123; len]
    }

    #[test]
    fn check_counts_skips_across_wrap() {
        let mut check = FrameCheck::new(16);
        check.inspect(&frame_of(14, 4));
        check.inspect(&frame_of(15, 4));
        check.inspect(&frame_of(2, 4));
        assert_eq!(check.skipped, 2);
        assert_eq!(check.torn, 0);
    }

    #[test]
    fn check_counts_repeats_and_torn() {
        let mut check = FrameCheck::new(16);
        check.inspect(&frame_of(3, 4));
        check.inspect(&frame_of(3, 4));
        let mut mixed = frame_of(4, 4);
        mixed[3] = 5 << 12;
        check.inspect(&mixed);
        assert_eq!(check.repeated, 1);
        assert_eq!(check.torn, 1);
        assert_eq!(check.last_tag, Some(3));
    }

    #[test]
    fn stream_check_accepts_drops_and_frame_changes() {
        let mut stream = StreamCheck::new(16);
        for value in [
            0x0001,
            0x0001,
            0x07FF,
            0x1000,
            // Frame 2 lost entirely to a full queue.
            0x3010,
            0x9000,
            // Tag wraps.
            0x0000,
            0x4000,
        ] {
            stream.observe(value);
        }
        assert_eq!(stream.received, 8);
        assert_eq!(stream.out_of_order, 0);
    }

    #[test]
    fn stream_check_flags_reordering() {
        let mut stream = StreamCheck::new(16);
        stream.observe((2 << 12) | 0x400);
        // Earlier pixel of the same frame.
        stream.observe((2 << 12) | 0x3FF);
        assert_eq!(stream.out_of_order, 1);
        // Pixel of the previous frame.
        stream.observe((1 << 12) | 0xFFF);
        assert_eq!(stream.out_of_order, 2);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_spawning() {
        let mut config = BridgeConfig::default();
        config.queue.capacity = 3;
        let err = run(&config).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    #[traced_test]
    async fn run_logs_start_and_summary() {
        let report = run(&small_config()).await.unwrap();
        assert_eq!(report.frames_published, 3);
        assert!(report.queue_drained());
        assert_eq!(report.stream_out_of_order, 0);
        assert!(logs_contain("starting clock domains"));
        assert!(logs_contain("simulation finished"));
    }
}
