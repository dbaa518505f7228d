//! Absolute-position mixing of scheduled buffers.
//!
//! The timeline is the render side of a sink: buffers are placed at absolute frame positions on
//! the device clock and [`Timeline::render`] pulls consecutive blocks of output from it, summing
//! whatever overlaps each block. The number of frames rendered so far *is* the device clock.

use super::buffer::MonoBuffer;
use super::error::{PlaybackError, PlaybackResult};
use crate::time::DeviceTime;

#[derive(Debug)]
struct Entry {
    start_frame: u64,
    buffer: MonoBuffer,
}

impl Entry {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.buffer.len() as u64
    }
}

/// Buffers placed at absolute frame positions, rendered in order.
#[derive(Debug)]
pub struct Timeline {
    sample_rate: u32,
    position: u64,
    entries: Vec<Entry>,
}

impl Timeline {
    /// Create an empty timeline whose clock starts at frame 0.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            position: 0,
            entries: Vec::new(),
        }
    }

    /// Sample rate of the clock
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Current device time.
    pub fn now(&self) -> DeviceTime {
        DeviceTime::from_frames(self.position, self.sample_rate)
    }

    /// Number of buffers that have not finished playing.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Check if no audio is queued
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    /// Device time at which the last queued buffer finishes.
    pub fn queued_until(&self) -> DeviceTime {
        let end = self
            .entries
            .iter()
            .map(Entry::end_frame)
            .max()
            .unwrap_or(self.position)
            .max(self.position);
        DeviceTime::from_frames(end, self.sample_rate)
    }

    /// Place `buffer` at `start`, returning the frame it will actually start on.
    ///
    /// A start that has already been rendered past is moved to the current position so the
    /// buffer still plays from its first frame. Empty buffers occupy no time and are not queued.
    pub fn schedule(&mut self, buffer: MonoBuffer, start: DeviceTime) -> PlaybackResult<u64> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(PlaybackError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: buffer.sample_rate(),
            });
        }

        let requested = start.to_frame(self.sample_rate);
        if buffer.is_empty() {
            return Ok(requested);
        }

        let start_frame = requested.max(self.position);
        if start_frame > requested {
            tracing::trace!(
                requested,
                start_frame,
                late_frames = start_frame - requested,
                "buffer scheduled in the past, playing immediately"
            );
        }

        let index = self
            .entries
            .partition_point(|entry| entry.start_frame <= start_frame);
        self.entries.insert(index, Entry { start_frame, buffer });
        Ok(start_frame)
    }

    /// Render the next block into `out`, advancing the clock.
    ///
    /// `out` is interleaved with `channels` channels; the mono signal is copied to every
    /// channel. Returns the number of frames rendered.
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> usize {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        out.fill(0.0);

        let block_start = self.position;
        let block_end = block_start + frames as u64;

        for entry in &self.entries {
            if entry.start_frame >= block_end {
                break;
            }
            let from = entry.start_frame.max(block_start);
            let to = entry.end_frame().min(block_end);
            if from >= to {
                continue;
            }

            let samples = &entry.buffer.samples()
                [(from - entry.start_frame) as usize..(to - entry.start_frame) as usize];
            let first_frame = (from - block_start) as usize;
            for (offset, &sample) in samples.iter().enumerate() {
                let base = (first_frame + offset) * channels;
                for slot in &mut out[base..base + channels] {
                    *slot += sample;
                }
            }
        }

        self.entries.retain(|entry| entry.end_frame() > block_end);
        self.position = block_end;
        frames
    }

    /// Drop everything that has not played yet. The clock keeps its position.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(frames: u64) -> DeviceTime {
        DeviceTime::from_frames(frames, 8)
    }

    #[test]
    fn test_back_to_back_buffers_render_contiguously() {
        let mut timeline = Timeline::new(8);
        timeline
            .schedule(MonoBuffer::new(vec![1.0, 2.0, 3.0], 8), at(0))
            .unwrap();
        timeline
            .schedule(MonoBuffer::new(vec![4.0, 5.0], 8), at(3))
            .unwrap();

        let mut out = [0.0f32; 6];
        assert_eq!(timeline.render(&mut out, 1), 6);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 0.0]);
        assert!(timeline.is_idle());
        assert_eq!(timeline.position(), 6);
    }

    #[test]
    fn test_buffer_spanning_blocks() {
        let mut timeline = Timeline::new(8);
        timeline
            .schedule(MonoBuffer::new(vec![1.0, 2.0, 3.0, 4.0], 8), at(2))
            .unwrap();

        let mut out = [0.0f32; 3];
        timeline.render(&mut out, 1);
        assert_eq!(out, [0.0, 0.0, 1.0]);
        assert_eq!(timeline.pending(), 1);

        timeline.render(&mut out, 1);
        assert_eq!(out, [2.0, 3.0, 4.0]);
        assert!(timeline.is_idle());
    }

    #[test]
    fn test_late_buffer_plays_from_first_frame() {
        let mut timeline = Timeline::new(8);
        let mut out = [0.0f32; 4];
        timeline.render(&mut out, 1);

        let start = timeline
            .schedule(MonoBuffer::new(vec![7.0, 8.0], 8), at(1))
            .unwrap();
        assert_eq!(start, 4);

        timeline.render(&mut out, 1);
        assert_eq!(out, [7.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn test_overlapping_buffers_are_summed() {
        let mut timeline = Timeline::new(8);
        timeline
            .schedule(MonoBuffer::new(vec![0.25; 4], 8), at(0))
            .unwrap();
        timeline
            .schedule(MonoBuffer::new(vec![0.5; 2], 8), at(1))
            .unwrap();

        let mut out = [0.0f32; 4];
        timeline.render(&mut out, 1);
        assert_eq!(out, [0.25, 0.75, 0.75, 0.25]);
    }

    #[test]
    fn test_mono_is_copied_to_every_channel() {
        let mut timeline = Timeline::new(8);
        timeline
            .schedule(MonoBuffer::new(vec![0.5, -0.5], 8), at(0))
            .unwrap();

        let mut out = [0.0f32; 6];
        assert_eq!(timeline.render(&mut out, 2), 3);
        assert_eq!(out, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_buffer_is_not_queued() {
        let mut timeline = Timeline::new(8);
        let start = timeline.schedule(MonoBuffer::new(Vec::new(), 8), at(5)).unwrap();
        assert_eq!(start, 5);
        assert!(timeline.is_idle());
    }

    #[test]
    fn test_rate_mismatch_is_rejected() {
        let mut timeline = Timeline::new(8);
        let err = timeline
            .schedule(MonoBuffer::new(vec![0.0], 16), at(0))
            .unwrap_err();
        assert_eq!(
            err,
            PlaybackError::SampleRateMismatch {
                expected: 8,
                actual: 16
            }
        );
    }

    #[test]
    fn test_queued_until() {
        let mut timeline = Timeline::new(8);
        assert_eq!(timeline.queued_until(), at(0));
        timeline
            .schedule(MonoBuffer::new(vec![0.0; 8], 8), at(4))
            .unwrap();
        assert_eq!(timeline.queued_until(), at(12));
    }
}
