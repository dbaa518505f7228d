//! Core traits for audio output.

use super::buffer::MonoBuffer;
use super::error::PlaybackResult;
use crate::time::DeviceTime;

/// Power state of an output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Opened but not rendering; the device clock is frozen
    Suspended,
    /// Rendering; the device clock advances
    Running,
    /// Torn down; nothing more can be scheduled
    Closed,
}

impl SinkState {
    /// Check if the sink is rendering audio
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if the sink has been torn down
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// The output device capability the scheduler drives.
///
/// A sink owns a monotonic device clock and accepts mono buffers to be played at absolute
/// positions on that clock. Implementations must never block the caller: buffers whose start is
/// in the future are queued, and buffers whose start has already passed begin playing as soon as
/// possible from their first frame.
pub trait OutputSink: Send {
    /// Current time on the device clock.
    fn now(&self) -> DeviceTime;

    /// Frames per second of the device clock; every scheduled buffer must match it.
    fn sample_rate(&self) -> u32;

    /// Current power state.
    fn state(&self) -> SinkState;

    /// Move a suspended sink to running.
    ///
    /// Calling this on a running sink has no observable effect.
    fn resume(&mut self) -> PlaybackResult<()>;

    /// Queue `buffer` to begin playing at `start` on the device clock.
    fn schedule_buffer(&mut self, buffer: MonoBuffer, start: DeviceTime) -> PlaybackResult<()>;

    /// Tear the sink down. Already-queued audio may be cut off.
    fn close(&mut self) -> PlaybackResult<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn now(&self) -> DeviceTime {
        (**self).now()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn state(&self) -> SinkState {
        (**self).state()
    }

    fn resume(&mut self) -> PlaybackResult<()> {
        (**self).resume()
    }

    fn schedule_buffer(&mut self, buffer: MonoBuffer, start: DeviceTime) -> PlaybackResult<()> {
        (**self).schedule_buffer(buffer, start)
    }

    fn close(&mut self) -> PlaybackResult<()> {
        (**self).close()
    }
}
