//! Audio output: the sink capability the scheduler drives.
//!
//! This module provides:
//! - The [`OutputSink`] trait: a device clock, resume-from-suspended, and buffer scheduling at
//!   absolute device times
//! - [`MonoBuffer`]: immutable, cheaply cloneable mono buffers
//! - [`Timeline`]: absolute-position mixing shared by every sink implementation
//! - [`MemorySink`]: an in-memory sink with a manually driven clock
//! - `DeviceSink`: a cpal-backed sink (requires the `playback` feature)
//!
//! # Example
//!
//! ```rust
//! use dac_stream::playback::*;
//! use dac_stream::DeviceTime;
//!
//! let mut sink = MemorySink::new(4);
//! sink.schedule_buffer(MonoBuffer::new(vec![0.5, 0.25], 4), DeviceTime::from_frames(1, 4))?;
//!
//! sink.advance_frames(4);
//! assert_eq!(sink.rendered(), vec![0.0, 0.5, 0.25, 0.0]);
//! # Ok::<(), PlaybackError>(())
//! ```

pub mod buffer;
pub mod error;
pub mod memory;
pub mod timeline;
pub mod traits;

#[cfg(feature = "playback")]
pub mod device;

// Re-export main types for convenience
pub use buffer::{MonoBuffer, ScheduledBuffer};
pub use error::{PlaybackError, PlaybackResult};
pub use memory::MemorySink;
pub use timeline::Timeline;
pub use traits::{OutputSink, SinkState};

#[cfg(feature = "playback")]
pub use device::{DeviceSink, DeviceSinkConfig};
