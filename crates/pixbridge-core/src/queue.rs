//! Wait-free SPSC queue between two independently clocked domains.
//!
//! The producer owns the write pointer and the consumer owns the read pointer.
//! Each pointer is `log2(capacity) + 1` bits wide: the low bits index the slot
//! array and the top bit flips on every wrap, so "full" (top bits differ, low
//! bits equal) is distinguishable from "empty" (pointers equal).
//!
//! A pointer crosses to the other side only as a Gray-coded atomic (Release
//! store, Acquire load) and is then pushed through a [`Synchronizer`] clocked
//! by the observing side. Comparisons always use the synchronized copy, which
//! is stale by a bounded number of local steps. Staleness is conservative in
//! both directions: the producer sees an older read pointer and may report
//! full early; the consumer sees an older write pointer and may report empty
//! late. Neither side can observe a slot that is not yet safe to touch.
//!
//! # Steps
//!
//! [`QueueProducer::write`] and [`QueueConsumer::read`] are each one step of
//! their domain: they clock the synchronizer, then evaluate. A side that has
//! nothing to do on a step calls `tick()` instead so its view keeps moving.
//! The status queries (`is_full`, `is_empty`, `occupancy`) observe the state
//! left by the last step and never advance it.
//!
//! # Safety
//!
//! The slot array is `UnsafeCell<T>` with `T: Copy`:
//! - Only the producer writes slots, at `write_ptr & index_mask`
//! - Only the consumer reads slots, at `read_ptr & index_mask`
//! - A slot is written only when the synchronized read pointer says it is free
//! - A slot is read only when the synchronized write pointer says it is filled
//! - The Release/Acquire pair on the pointer orders slot access across threads

#[cfg(all(feature = "loom", test))]
use loom::cell::UnsafeCell;
#[cfg(all(feature = "loom", test))]
use loom::sync::{atomic::AtomicU32, Arc};
#[cfg(not(all(feature = "loom", test)))]
use std::sync::{atomic::AtomicU32, Arc};
#[cfg(not(all(feature = "loom", test)))]
use cell::UnsafeCell;

use std::sync::atomic::Ordering;

use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::gray::{from_gray, to_gray};
use crate::sync::{check_depth, Synchronizer};

/// `std::cell::UnsafeCell` behind loom's closure-based access API, so the
/// same slot code runs under the loom model.
#[cfg(not(all(feature = "loom", test)))]
mod cell {
    #[derive(Debug)]
    pub(super) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

    impl<T> UnsafeCell<T> {
        pub(super) fn new(value: T) -> Self {
            Self(std::cell::UnsafeCell::new(value))
        }

        #[inline]
        pub(super) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
            f(self.0.get())
        }

        #[inline]
        pub(super) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
            f(self.0.get())
        }
    }
}

/// Largest capacity whose pointer (with wrap bit) still fits in 32 bits.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 30;

/// State shared by the two ends.
struct Shared<T> {
    slots: Box<[UnsafeCell<T>]>,
    capacity: u32,
    /// Producer's pointer, Gray-coded. Only the producer stores to this.
    write_gray: AtomicU32,
    /// Consumer's pointer, Gray-coded. Only the consumer stores to this.
    read_gray: AtomicU32,
}

// SAFETY: Shared is used by exactly one producer and one consumer. The
// producer writes only the slot at its write pointer and only after the
// consumer has released it; the consumer reads only the slot at its read
// pointer and only after the producer has published it. Release stores and
// Acquire loads on the Gray pointers order those accesses.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    #[inline]
    fn index_mask(&self) -> u32 {
        self.capacity - 1
    }

    #[inline]
    fn pointer_mask(&self) -> u32 {
        (self.capacity << 1) - 1
    }
}

/// A fixed-capacity cross-domain queue, not yet split into its two ends.
pub struct CrossDomainQueue<T> {
    shared: Arc<Shared<T>>,
    sync_stages: usize,
}

impl<T: Copy + Default + Send> CrossDomainQueue<T> {
    /// Allocate a queue of `capacity` slots whose pointers cross through
    /// `sync_stages`-deep synchronizers.
    ///
    /// `capacity` must be a power of two no larger than [`MAX_QUEUE_CAPACITY`].
    pub fn new(capacity: usize, sync_stages: usize) -> CoreResult<Self> {
        if !capacity.is_power_of_two() {
            return Err(CoreError::CapacityNotPowerOfTwo { capacity });
        }
        if capacity > MAX_QUEUE_CAPACITY {
            return Err(CoreError::CapacityTooLarge {
                capacity,
                max: MAX_QUEUE_CAPACITY,
            });
        }
        check_depth(sync_stages)?;

        let slots: Box<[UnsafeCell<T>]> = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                slots,
                capacity: capacity as u32,
                write_gray: AtomicU32::new(0),
                read_gray: AtomicU32::new(0),
            }),
            sync_stages,
        })
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }

    /// Hand out the producer and consumer ends.
    #[must_use]
    pub fn split(self) -> (QueueProducer<T>, QueueConsumer<T>) {
        let producer = QueueProducer {
            shared: Arc::clone(&self.shared),
            write_ptr: 0,
            read_sync: Synchronizer::new(self.sync_stages, to_gray(0)),
            stats: ProducerStats::default(),
        };
        let consumer = QueueConsumer {
            shared: self.shared,
            read_ptr: 0,
            write_sync: Synchronizer::new(self.sync_stages, to_gray(0)),
            stats: ConsumerStats::default(),
        };
        (producer, consumer)
    }
}

/// Counters kept by the producer end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Values stored into the queue.
    pub accepted: u64,
    /// Values dropped because the queue looked full.
    pub dropped: u64,
}

/// Counters kept by the consumer end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Values handed to the caller.
    pub delivered: u64,
    /// Read steps that found the queue empty.
    pub empty_reads: u64,
}

/// Producer end. Not `Clone`: one producer per queue.
pub struct QueueProducer<T> {
    shared: Arc<Shared<T>>,
    /// Own pointer, binary.
    write_ptr: u32,
    /// Consumer's pointer as seen from this domain, Gray-coded.
    read_sync: Synchronizer,
    stats: ProducerStats,
}

impl<T: Copy> QueueProducer<T> {
    /// One producer step that stores `value` unless the queue looks full.
    ///
    /// Returns `false` when the value was dropped. Dropping is the overflow
    /// policy: the producer is never slowed down.
    pub fn write(&mut self, value: T) -> bool {
        self.tick();

        if self.is_full() {
            self.stats.dropped += 1;
            trace!(
                dropped = self.stats.dropped,
                capacity = self.shared.capacity,
                "cross-domain queue full, value dropped"
            );
            return false;
        }

        let idx = (self.write_ptr & self.shared.index_mask()) as usize;
        // SAFETY: the synchronized read pointer shows this slot as released
        // by the consumer, and only the producer writes slots.
        self.shared.slots[idx].with_mut(|slot| unsafe { *slot = value });

        self.write_ptr = self.write_ptr.wrapping_add(1) & self.shared.pointer_mask();
        self.shared
            .write_gray
            .store(to_gray(self.write_ptr), Ordering::Release);
        self.stats.accepted += 1;
        true
    }

    /// Idle producer step: only samples the consumer's pointer.
    #[inline]
    pub fn tick(&mut self) {
        let sample = self.shared.read_gray.load(Ordering::Acquire);
        self.read_sync.clock(sample);
    }

    #[inline]
    fn synced_read_ptr(&self) -> u32 {
        from_gray(self.read_sync.output())
    }

    /// True when the next write would be dropped.
    #[must_use]
    pub fn is_full(&self) -> bool {
        (self.write_ptr ^ self.synced_read_ptr()) == self.shared.capacity
    }

    /// Occupancy as seen from the producer. Never under-reports.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        (self.write_ptr.wrapping_sub(self.synced_read_ptr()) & self.shared.pointer_mask())
            as usize
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }

    /// Accepted and dropped counts so far.
    #[must_use]
    pub fn stats(&self) -> ProducerStats {
        self.stats
    }
}

/// Consumer end. Not `Clone`: one consumer per queue.
pub struct QueueConsumer<T> {
    shared: Arc<Shared<T>>,
    /// Own pointer, binary.
    read_ptr: u32,
    /// Producer's pointer as seen from this domain, Gray-coded.
    write_sync: Synchronizer,
    stats: ConsumerStats,
}

impl<T: Copy> QueueConsumer<T> {
    /// One consumer step that takes the oldest value, if one is visible.
    ///
    /// An empty queue yields `None`, never a stale slot.
    pub fn read(&mut self) -> Option<T> {
        self.tick();

        if self.is_empty() {
            self.stats.empty_reads += 1;
            return None;
        }

        let idx = (self.read_ptr & self.shared.index_mask()) as usize;
        // SAFETY: the synchronized write pointer shows this slot as filled
        // by the producer, and only the consumer reads slots.
        let value = self.shared.slots[idx].with(|slot| unsafe { *slot });

        self.read_ptr = self.read_ptr.wrapping_add(1) & self.shared.pointer_mask();
        self.shared
            .read_gray
            .store(to_gray(self.read_ptr), Ordering::Release);
        self.stats.delivered += 1;
        Some(value)
    }

    /// Idle consumer step: only samples the producer's pointer.
    #[inline]
    pub fn tick(&mut self) {
        let sample = self.shared.write_gray.load(Ordering::Acquire);
        self.write_sync.clock(sample);
    }

    #[inline]
    fn synced_write_ptr(&self) -> u32 {
        from_gray(self.write_sync.output())
    }

    /// True when the next read would come back empty (before the next sample).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.synced_write_ptr() == self.read_ptr
    }

    /// Occupancy as seen from the consumer. Never over-reports.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        (self.synced_write_ptr().wrapping_sub(self.read_ptr) & self.shared.pointer_mask())
            as usize
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }

    /// Delivered and empty-read counts so far.
    #[must_use]
    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }
}


#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use super::*;

    #[test]
    fn published_values_arrive_in_order() {
        loom::model(|| {
            let (mut tx, mut rx) = CrossDomainQueue::<u32>::new(2, 1).unwrap().split();

            let producer = loom::thread::spawn(move || {
                for v in 1..=3 {
                    let _ = tx.write(v);
                }
            });

            let mut last = 0;
            for _ in 0..3 {
                if let Some(v) = rx.read() {
                    assert!(v > last);
                    last = v;
                }
            }

            producer.join().unwrap();
        });
    }
}
