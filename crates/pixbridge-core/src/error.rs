//! Construction-time errors for the cross-domain core.
//!
//! Overflow, underflow and out-of-range coordinates are not errors at this
//! layer. They are absorbed by the component that sees them and counted in
//! its statistics, so the only fallible operations are the constructors.

use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Invalid construction parameters for a queue, frame store or decimator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Queue capacity must be a non-zero power of two.
    #[error("queue capacity {capacity} is not a power of two")]
    CapacityNotPowerOfTwo {
        /// Requested capacity.
        capacity: usize,
    },

    /// Queue capacity does not leave room for the wrap bit in a 32-bit pointer.
    #[error("queue capacity {capacity} exceeds the maximum of {max}")]
    CapacityTooLarge {
        /// Requested capacity.
        capacity: usize,
        /// Largest supported capacity.
        max: usize,
    },

    /// Synchronizer depth must be between one and the supported maximum.
    #[error("synchronizer depth {stages} is outside 1..={max}")]
    SyncStagesOutOfRange {
        /// Requested depth.
        stages: usize,
        /// Largest supported depth.
        max: usize,
    },

    /// Frame width and height must be non-zero and fit the pixel budget.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// Pixels are stored in 16-bit cells.
    #[error("pixel bit-width {bits} is outside 1..=16")]
    InvalidPixelBits {
        /// Requested bit-width.
        bits: u8,
    },

    /// A decimation factor of zero has no meaning.
    #[error("decimation factor must be non-zero")]
    InvalidDecimationFactor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = CoreError::CapacityNotPowerOfTwo { capacity: 12 };
        assert_eq!(err.to_string(), "queue capacity 12 is not a power of two");

        let err = CoreError::SyncStagesOutOfRange { stages: 9, max: 4 };
        assert!(err.to_string().contains("1..=4"));
    }
}
