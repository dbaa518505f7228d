//! Immutable mono playback buffers.

use crate::time::DeviceTime;
use std::sync::Arc;
use std::time::Duration;

/// A mono buffer of `f32` frames at a fixed sample rate.
///
/// Samples are stored behind an `Arc`, so cloning a buffer never copies audio. Once built, a
/// buffer is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl MonoBuffer {
    /// Create a buffer that takes ownership of `samples`, one sample per frame.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Create a buffer by copying `samples` in order.
    pub fn from_slice(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            samples: Arc::from(samples),
            sample_rate,
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate the buffer was built at
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The frames in playback order
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Playing time of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// A buffer together with the device time it was scheduled to start at.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBuffer {
    /// The audio
    pub buffer: MonoBuffer,
    /// Requested start on the device clock
    pub start: DeviceTime,
}

impl ScheduledBuffer {
    /// Device time at which the buffer finishes playing, if it starts on time.
    pub fn end(&self) -> DeviceTime {
        self.start
            .offset_by_samples(self.buffer.len() as u64, self.buffer.sample_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_preserves_order() {
        let buffer = MonoBuffer::from_slice(&[0.1, -0.2, 0.3], 44100);
        assert_eq!(buffer.samples(), &[0.1, -0.2, 0.3]);
        assert_eq!(buffer.len(), 3);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_duration() {
        let buffer = MonoBuffer::new(vec![0.0; 4800], 48000);
        assert_eq!(buffer.duration(), Duration::from_millis(100));
        assert_eq!(MonoBuffer::new(Vec::new(), 48000).duration(), Duration::ZERO);
        assert_eq!(MonoBuffer::new(vec![0.0; 10], 0).duration(), Duration::ZERO);
    }

    #[test]
    fn test_clone_shares_storage() {
        let buffer = MonoBuffer::new(vec![0.5; 64], 8000);
        let copy = buffer.clone();
        assert!(std::ptr::eq(buffer.samples(), copy.samples()));
    }

    #[test]
    fn test_scheduled_end() {
        let scheduled = ScheduledBuffer {
            buffer: MonoBuffer::new(vec![0.0; 8000], 8000),
            start: DeviceTime::from_secs(2.0),
        };
        assert_eq!(scheduled.end(), DeviceTime::from_secs(3.0));
    }
}
