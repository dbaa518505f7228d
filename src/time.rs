//! Device clock time values.
//!
//! The output device keeps its own monotonic clock, distinct from wall-clock time. Every buffer
//! position the scheduler computes is expressed on that clock as seconds since the device was
//! opened. Positions derived from a sample count are always computed from the session start
//! (`start + samples / rate`) rather than by accumulating per-buffer durations, so rounding error
//! never compounds across buffers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A point on the output device's clock, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceTime(f64);

impl DeviceTime {
    /// The instant the device clock started.
    pub const ZERO: Self = Self(0.0);

    /// Create a device time from seconds.
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Device time reached after `frames` frames have been played at `sample_rate`.
    pub fn from_frames(frames: u64, sample_rate: u32) -> Self {
        Self(frames as f64 / sample_rate.max(1) as f64)
    }

    /// Seconds since the device clock started.
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// The time `samples` frames after `self` at `sample_rate`.
    pub fn offset_by_samples(self, samples: u64, sample_rate: u32) -> Self {
        Self(self.0 + samples as f64 / sample_rate.max(1) as f64)
    }

    /// The nearest whole frame index for this time at `sample_rate`.
    ///
    /// Times before the clock origin map to frame 0.
    pub fn to_frame(self, sample_rate: u32) -> u64 {
        let frame = (self.0 * sample_rate as f64).round();
        if frame.is_finite() && frame > 0.0 {
            frame as u64
        } else {
            0
        }
    }

    /// Signed distance from `earlier` to `self` in milliseconds.
    ///
    /// Negative when `self` is before `earlier`.
    pub fn millis_since(self, earlier: DeviceTime) -> f64 {
        (self.0 - earlier.0) * 1000.0
    }

    /// Duration from `earlier` to `self`, or zero if `self` is not after `earlier`.
    pub fn saturating_duration_since(self, earlier: DeviceTime) -> Duration {
        let secs = self.0 - earlier.0;
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

impl fmt::Display for DeviceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn test_offset_is_computed_from_origin() {
        let start = DeviceTime::from_secs(1.5);
        let later = start.offset_by_samples(512, 44100);
        assert_approx_eq!(later.as_secs(), 1.5 + 512.0 / 44100.0, 1e-12);
    }

    #[test]
    fn test_frame_round_trip_is_exact_for_whole_frames() {
        for frames in [0u64, 1, 511, 44_100, 10_000_019] {
            let time = DeviceTime::from_frames(frames, 48000);
            assert_eq!(time.to_frame(48000), frames);
        }
    }

    #[test]
    fn test_negative_time_maps_to_first_frame() {
        assert_eq!(DeviceTime::from_secs(-0.25).to_frame(44100), 0);
    }

    #[test]
    fn test_millis_since_is_signed() {
        let a = DeviceTime::from_secs(1.0);
        let b = DeviceTime::from_secs(1.005);
        assert_approx_eq!(b.millis_since(a), 5.0, 1e-9);
        assert_approx_eq!(a.millis_since(b), -5.0, 1e-9);
    }

    #[test]
    fn test_saturating_duration_since() {
        let a = DeviceTime::from_secs(2.0);
        let b = DeviceTime::from_secs(2.5);
        assert_eq!(b.saturating_duration_since(a), Duration::from_millis(500));
        assert_eq!(a.saturating_duration_since(b), Duration::ZERO);
    }
}
