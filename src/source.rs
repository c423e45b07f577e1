//! Test pattern source for the capture domain.
//!
//! Emits one [`PixelEvent`] per producer step in raster order over the
//! decimator's input area, separated by blanking lines. During blanking the
//! events are invalid and the frame-boundary level is high, so every blanking
//! interval produces exactly one rising edge. The stream starts in blanking;
//! its first edge arms capture.
//!
//! Each value carries the frame number (mod 16) in its top four significant
//! bits so a consumer can tell whole frames from mixed ones. The bits below
//! the tag are a raster ramp: non-decreasing in emission order within a frame,
//! so a consumer of the pixel stream can check arrival order.

use pixbridge_core::PixelEvent;

/// Width of the per-frame tag.
pub const TAG_BITS: u8 = 4;

/// Narrowest pixel that leaves room for a tag and a useful ramp.
pub const MIN_TAGGED_PIXEL_BITS: u8 = 8;

#[inline]
fn ramp_bits(pixel_bits: u8) -> u8 {
    pixel_bits.min(16).saturating_sub(TAG_BITS)
}

/// Frame tag stored in a pixel value.
///
/// Pixels narrower than the tag keep it in their low bits.
#[must_use]
pub fn tag_of(value: u16, pixel_bits: u8) -> u8 {
    ((value >> ramp_bits(pixel_bits)) & ((1 << TAG_BITS) - 1)) as u8
}

/// Raster ramp stored below the tag.
#[must_use]
pub fn ramp_of(value: u16, pixel_bits: u8) -> u16 {
    (u32::from(value) & ((1u32 << ramp_bits(pixel_bits)) - 1)) as u16
}

/// Raster generator with vertical blanking.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    vblank_lines: u32,
    pixel_bits: u8,
    x: u32,
    line: u32,
    frame: u64,
}

impl TestPatternSource {
    /// Create a source for an input area of `width` x `height`.
    ///
    /// With fewer than `MIN_TAGGED_PIXEL_BITS` bits the ramp is too coarse
    /// to be useful, and without blanking lines there is no frame boundary;
    /// the configuration layer rejects both.
    #[must_use]
    pub fn new(width: u32, height: u32, vblank_lines: u32, pixel_bits: u8) -> Self {
        Self {
            width,
            height,
            vblank_lines,
            pixel_bits: pixel_bits.min(16),
            x: 0,
            line: 0,
            frame: 0,
        }
    }

    /// Next event and the frame-boundary level for this step.
    pub fn next_event(&mut self) -> (PixelEvent, bool) {
        let out = if self.line < self.vblank_lines {
            (PixelEvent::default(), true)
        } else {
            let y = self.line - self.vblank_lines;
            let event = PixelEvent {
                x: self.x,
                y,
                value: self.pixel_value(self.x, y),
                valid: true,
            };
            (event, false)
        };
        self.advance();
        out
    }

    fn advance(&mut self) {
        self.x += 1;
        if self.x < self.width {
            return;
        }
        self.x = 0;
        self.line += 1;
        if self.line == self.vblank_lines.saturating_add(self.height) {
            self.line = 0;
            self.frame += 1;
        }
    }

    /// Frame tag over a ramp from 0 at the first pixel to full scale at the last.
    fn pixel_value(&self, x: u32, y: u32) -> u16 {
        let low_bits = ramp_bits(self.pixel_bits);
        let low_mask = (1u128 << low_bits) - 1;

        // Input areas can exceed u64 once multiplied by the ramp scale.
        let idx = u128::from(y) * u128::from(self.width) + u128::from(x);
        let last = (u128::from(self.width) * u128::from(self.height))
            .saturating_sub(1)
            .max(1);
        let low = (idx * low_mask / last).min(low_mask) as u32;

        let tag = (self.frame & ((1 << TAG_BITS) - 1)) as u32;
        ((tag << low_bits) | low) as u16
    }

    /// Active frames fully emitted so far.
    #[must_use]
    pub fn frames_emitted(&self) -> u64 {
        self.frame
    }

    /// Steps in one frame period, blanking included.
    #[must_use]
    pub fn steps_per_frame(&self) -> u64 {
        u64::from(self.width) * (u64::from(self.height) + u64::from(self.vblank_lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_blanking_then_rasters() {
        let mut source = TestPatternSource::new(4, 3, 2, 8);
        for _ in 0..8 {
            let (event, boundary) = source.next_event();
            assert!(boundary);
            assert!(!event.valid);
        }
        for y in 0..3 {
            for x in 0..4 {
                let (event, boundary) = source.next_event();
                assert!(!boundary);
                assert!(event.valid);
                assert_eq!((event.x, event.y), (x, y));
            }
        }
        assert_eq!(source.frames_emitted(), 1);
        assert!(source.next_event().1);
    }

    #[test]
    fn values_carry_frame_tag() {
        let mut source = TestPatternSource::new(8, 8, 1, 12);
        for frame in 0..20u64 {
            for _ in 0..source.steps_per_frame() {
                let (event, _) = source.next_event();
                if event.valid {
                    assert_eq!(tag_of(event.value, 12), (frame % 16) as u8);
                    assert!(event.value < (1 << 12));
                }
            }
        }
        assert_eq!(source.frames_emitted(), 20);
    }

    #[test]
    fn one_rising_edge_per_period() {
        let mut source = TestPatternSource::new(5, 4, 3, 16);
        let mut prev = false;
        let mut edges = 0;
        for _ in 0..source.steps_per_frame() * 7 {
            let (_, level) = source.next_event();
            if level && !prev {
                edges += 1;
            }
            prev = level;
        }
        assert_eq!(edges, 7);
    }

    #[test]
    fn ramp_is_non_decreasing_within_a_frame() {
        let mut source = TestPatternSource::new(7, 5, 1, 12);
        let mut last = None;
        for _ in 0..source.steps_per_frame() {
            let (event, _) = source.next_event();
            if event.valid {
                let ramp = ramp_of(event.value, 12);
                assert!(last.map_or(true, |prev| ramp >= prev));
                last = Some(ramp);
            }
        }
        assert_eq!(last, Some(0xFF));
    }

    #[test]
    fn huge_input_area_does_not_overflow() {
        let source = TestPatternSource::new(1_600_000, 1_200_000, 1, 16);
        let corner = source.pixel_value(1_599_999, 1_199_999);
        assert_eq!(ramp_of(corner, 16), 0x0FFF);
        assert_eq!(tag_of(corner, 16), 0);
        assert_eq!(ramp_of(source.pixel_value(0, 0), 16), 0);
    }

    #[test]
    fn narrow_pixels_do_not_underflow() {
        for bits in 0..=3 {
            assert_eq!(tag_of(0x000B, bits), 0xB);
            assert_eq!(ramp_of(0x000B, bits), 0);
        }
        assert_eq!(tag_of(0xA000, 40), 0xA);

        let mut source = TestPatternSource::new(2, 2, 1, 2);
        for _ in 0..source.steps_per_frame() * 2 {
            source.next_event();
        }
        assert_eq!(source.frames_emitted(), 2);
    }
}
