//! Cross-domain pixel transport.
//!
//! This crate moves a stream of pixels from a producer that advances on its
//! own clock to a consumer that advances on an unrelated one, without locks,
//! without blocking and without ever exposing a half-written value:
//!
//! - [`CrossDomainQueue`]: wait-free SPSC ring whose pointers cross domains
//!   Gray-coded through a [`Synchronizer`] delay line
//! - [`FrameStore`]: two pixel grids, one filled while the other is read,
//!   swapped on a frame boundary
//! - [`Decimator`]: integer-factor subsampling ahead of both
//! - [`frame_ready_channel`]: one-bit notification queue announcing frames
//! - [`bridge`]: all of the above wired into a [`CaptureSide`] and a
//!   [`DisplaySide`]
//!
//! # Example
//!
//! ```
//! use pixbridge_core::{bridge, BridgeSettings, FrameFormat, PixelEvent};
//!
//! let settings = BridgeSettings {
//!     format: FrameFormat { width: 2, height: 2, pixel_bits: 8, blank: 0 },
//!     ..Default::default()
//! };
//! let (mut capture, mut display) = bridge(&settings)?;
//!
//! // Start-of-stream boundary arms capture.
//! capture.clock(PixelEvent::default(), true);
//! capture.clock(PixelEvent::default(), false);
//! for y in 0..4 {
//!     for x in 0..4 {
//!         capture.clock(PixelEvent { x, y, value: 42, valid: true }, false);
//!     }
//! }
//! capture.clock(PixelEvent::default(), true);
//!
//! while !display.step() {}
//! assert!(display.frame_ready());
//! assert_eq!(display.read_pixel(1, 1), 42);
//! # Ok::<(), pixbridge_core::CoreError>(())
//! ```
//!
//! Runtime overflow, underflow and out-of-range coordinates are absorbed and
//! counted; only construction can fail, with [`CoreError`].

pub mod bridge;
pub mod decimator;
pub mod error;
pub mod frame_ready;
pub mod frame_store;
pub mod gray;
pub mod queue;
pub mod sync;

pub use bridge::{bridge, BridgeSettings, CaptureSide, CaptureStats, DisplaySide, DisplayStats, PixelEvent};
pub use decimator::Decimator;
pub use error::{CoreError, CoreResult};
pub use frame_ready::{frame_ready_channel, FrameReadyReceiver, FrameReadySender};
pub use frame_store::{FrameFormat, FrameReader, FrameStore, FrameWriter};
pub use queue::{ConsumerStats, CrossDomainQueue, ProducerStats, QueueConsumer, QueueProducer};
pub use sync::{Synchronizer, DEFAULT_SYNC_STAGES, MAX_SYNC_STAGES};
