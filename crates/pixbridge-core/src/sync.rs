//! Multi-stage synchronizer for values published by the other domain.
//!
//! Each local step shifts a fresh sample in at stage 0 and exposes the oldest
//! stage. With `depth` stages a value published before local step `k` is
//! visible to the comparison logic from step `k + depth - 1` onward, which
//! is the bounded staleness every protocol on top of the core must tolerate.

use crate::error::{CoreError, CoreResult};

/// Largest supported synchronizer depth.
pub const MAX_SYNC_STAGES: usize = 4;

/// Depth used when the caller does not choose one.
pub const DEFAULT_SYNC_STAGES: usize = 2;

/// Validate a requested synchronizer depth.
pub fn check_depth(depth: usize) -> CoreResult<()> {
    if depth == 0 || depth > MAX_SYNC_STAGES {
        return Err(CoreError::SyncStagesOutOfRange {
            stages: depth,
            max: MAX_SYNC_STAGES,
        });
    }
    Ok(())
}

/// Fixed-depth delay line of raw samples.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    stages: [u32; MAX_SYNC_STAGES],
    depth: usize,
}

impl Synchronizer {
    /// Build a synchronizer whose every stage holds `initial`.
    ///
    /// `depth` must already have passed [`check_depth`].
    pub fn new(depth: usize, initial: u32) -> Self {
        debug_assert!((1..=MAX_SYNC_STAGES).contains(&depth));
        Self {
            stages: [initial; MAX_SYNC_STAGES],
            depth: depth.clamp(1, MAX_SYNC_STAGES),
        }
    }

    /// Shift `sample` in and return the new output.
    #[inline]
    pub fn clock(&mut self, sample: u32) -> u32 {
        self.stages.copy_within(0..self.depth - 1, 1);
        self.stages[0] = sample;
        self.output()
    }

    /// Current output, the oldest sample held.
    #[inline]
    pub fn output(&self) -> u32 {
        self.stages[self.depth - 1]
    }

    /// Number of stages.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_stage_output_lags_by_one_step() {
        let mut sync = Synchronizer::new(2, 0);
        assert_eq!(sync.clock(5), 0);
        assert_eq!(sync.clock(6), 5);
        assert_eq!(sync.clock(6), 6);
    }

    #[test]
    fn single_stage_is_transparent() {
        let mut sync = Synchronizer::new(1, 0);
        assert_eq!(sync.clock(3), 3);
        assert_eq!(sync.output(), 3);
    }

    #[test]
    fn four_stages_hold_three_older_samples() {
        let mut sync = Synchronizer::new(4, 9);
        assert_eq!(sync.clock(1), 9);
        assert_eq!(sync.clock(2), 9);
        assert_eq!(sync.clock(3), 9);
        assert_eq!(sync.clock(4), 1);
        assert_eq!(sync.clock(5), 2);
    }

    #[test]
    fn depth_is_validated() {
        assert!(check_depth(0).is_err());
        assert!(check_depth(MAX_SYNC_STAGES + 1).is_err());
        assert!(check_depth(DEFAULT_SYNC_STAGES).is_ok());
    }
}
