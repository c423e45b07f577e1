//! Integer-factor subsampling of the incoming pixel grid.
//!
//! Keeps only pixels whose coordinates are both multiples of the factor
//! (even/even for the usual factor of two), maps them to `(x / f, y / f)`
//! and drops anything that lands outside the output frame. Nothing is ever
//! clamped onto the border.

use crate::error::{CoreError, CoreResult};

/// Coordinate mapper with keep/drop counters.
#[derive(Debug, Clone)]
pub struct Decimator {
    factor: u32,
    out_width: u32,
    out_height: u32,
    kept: u64,
    dropped: u64,
}

impl Decimator {
    /// Build a decimator for an output frame of `out_width` x `out_height`.
    pub fn new(factor: u32, out_width: u32, out_height: u32) -> CoreResult<Self> {
        if factor == 0 {
            return Err(CoreError::InvalidDecimationFactor);
        }
        if out_width == 0 || out_height == 0 {
            return Err(CoreError::InvalidDimensions {
                width: out_width,
                height: out_height,
            });
        }
        Ok(Self {
            factor,
            out_width,
            out_height,
            kept: 0,
            dropped: 0,
        })
    }

    /// Output coordinate for an input pixel, or `None` if it is dropped.
    #[inline]
    pub fn map(&mut self, x: u32, y: u32) -> Option<(u32, u32)> {
        let mapped = self.mapping(x, y);
        match mapped {
            Some(_) => self.kept += 1,
            None => self.dropped += 1,
        }
        mapped
    }

    #[inline]
    fn mapping(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        if x % self.factor != 0 || y % self.factor != 0 {
            return None;
        }
        let (ox, oy) = (x / self.factor, y / self.factor);
        (ox < self.out_width && oy < self.out_height).then_some((ox, oy))
    }

    /// Decimation factor in each axis.
    #[must_use]
    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Input dimensions that exactly cover the output frame.
    #[must_use]
    pub fn input_size(&self) -> (u32, u32) {
        (
            self.out_width.saturating_mul(self.factor),
            self.out_height.saturating_mul(self.factor),
        )
    }

    /// Pixels forwarded so far.
    #[must_use]
    pub fn kept(&self) -> u64 {
        self.kept
    }

    /// Pixels discarded so far, by parity or by bounds.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_even_maps_to_half() {
        let mut dec = Decimator::new(2, 320, 240).unwrap();
        assert_eq!(dec.map(0, 0), Some((0, 0)));
        assert_eq!(dec.map(10, 4), Some((5, 2)));
        assert_eq!(dec.map(638, 478), Some((319, 239)));
    }

    #[test]
    fn odd_coordinates_are_dropped() {
        let mut dec = Decimator::new(2, 320, 240).unwrap();
        assert_eq!(dec.map(1, 0), None);
        assert_eq!(dec.map(0, 1), None);
        assert_eq!(dec.map(3, 7), None);
        assert_eq!(dec.kept(), 0);
        assert_eq!(dec.dropped(), 3);
    }

    #[test]
    fn out_of_bounds_is_dropped_not_clamped() {
        let mut dec = Decimator::new(2, 4, 4).unwrap();
        assert_eq!(dec.map(8, 0), None);
        assert_eq!(dec.map(0, 8), None);
        assert_eq!(dec.map(6, 6), Some((3, 3)));
    }

    #[test]
    fn full_raster_keeps_one_in_four() {
        let mut dec = Decimator::new(2, 4, 3).unwrap();
        let (w, h) = dec.input_size();
        assert_eq!((w, h), (8, 6));
        let kept: Vec<_> = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .filter_map(|(x, y)| dec.map(x, y))
            .collect();
        assert_eq!(kept.len(), 12);
        assert_eq!(dec.dropped(), 36);
    }

    #[test]
    fn factor_one_is_identity_within_bounds() {
        let mut dec = Decimator::new(1, 2, 2).unwrap();
        assert_eq!(dec.map(1, 1), Some((1, 1)));
        assert_eq!(dec.map(2, 0), None);
    }

    #[test]
    fn rejects_zero_factor() {
        assert_eq!(
            Decimator::new(0, 4, 4).err(),
            Some(CoreError::InvalidDecimationFactor)
        );
    }
}
