//! In-memory output sink with a manually driven clock.
//!
//! `MemorySink` behaves like a device sink whose audio callback only runs when asked to: time
//! passes when [`MemorySink::advance`] renders frames, exactly as a hardware clock advances when
//! the device consumes frames. It records every buffer handed to it, which makes it the sink of
//! choice for offline rendering and for deterministic tests of the scheduler.

use super::buffer::{MonoBuffer, ScheduledBuffer};
use super::error::{PlaybackError, PlaybackResult};
use super::timeline::Timeline;
use super::traits::{OutputSink, SinkState};
use crate::time::DeviceTime;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct MemorySinkInner {
    timeline: Timeline,
    state: SinkState,
    scheduled: Vec<ScheduledBuffer>,
    rendered: Vec<f32>,
    resume_calls: usize,
    resume_failure: Option<String>,
}

/// A cloneable in-memory sink. Clones share the same clock and queue.
#[derive(Debug, Clone)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

impl MemorySink {
    /// Create a running sink at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_state(sample_rate, SinkState::Running)
    }

    /// Create a sink that starts suspended and must be resumed before its clock moves.
    pub fn suspended(sample_rate: u32) -> Self {
        Self::with_state(sample_rate, SinkState::Suspended)
    }

    fn with_state(sample_rate: u32, state: SinkState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemorySinkInner {
                timeline: Timeline::new(sample_rate),
                state,
                scheduled: Vec::new(),
                rendered: Vec::new(),
                resume_calls: 0,
                resume_failure: None,
            })),
        }
    }

    /// Let `duration` of device time pass, rendering queued audio.
    ///
    /// The clock is frozen unless the sink is running. Returns the number of frames rendered.
    pub fn advance(&self, duration: Duration) -> usize {
        let frames = {
            let inner = self.inner.lock();
            DeviceTime::from_secs(duration.as_secs_f64()).to_frame(inner.timeline.sample_rate())
        };
        self.advance_frames(frames as usize)
    }

    /// Let `frames` frames of device time pass, rendering queued audio.
    pub fn advance_frames(&self, frames: usize) -> usize {
        let mut inner = self.inner.lock();
        if !inner.state.is_running() {
            return 0;
        }
        let mut block = vec![0.0f32; frames];
        let rendered = inner.timeline.render(&mut block, 1);
        inner.rendered.extend_from_slice(&block[..rendered]);
        rendered
    }

    /// Suspend a running sink.
    pub fn suspend(&self) {
        let mut inner = self.inner.lock();
        if inner.state.is_running() {
            inner.state = SinkState::Suspended;
        }
    }

    /// Make the next `resume()` call fail with `reason`.
    pub fn fail_next_resume(&self, reason: impl Into<String>) {
        self.inner.lock().resume_failure = Some(reason.into());
    }

    /// Every buffer scheduled so far, with its requested start time.
    pub fn scheduled(&self) -> Vec<ScheduledBuffer> {
        self.inner.lock().scheduled.clone()
    }

    /// Take the record of scheduled buffers, leaving it empty.
    ///
    /// Long-running offline renders should drain this and [`take_rendered`](Self::take_rendered)
    /// periodically; both records otherwise grow with every batch.
    pub fn take_scheduled(&self) -> Vec<ScheduledBuffer> {
        std::mem::take(&mut self.inner.lock().scheduled)
    }

    /// Everything rendered so far.
    pub fn rendered(&self) -> Vec<f32> {
        self.inner.lock().rendered.clone()
    }

    /// Take the rendered output, leaving the record empty.
    pub fn take_rendered(&self) -> Vec<f32> {
        std::mem::take(&mut self.inner.lock().rendered)
    }

    /// How many times `resume()` has been called.
    pub fn resume_calls(&self) -> usize {
        self.inner.lock().resume_calls
    }

    /// Buffers that have not finished playing.
    pub fn pending(&self) -> usize {
        self.inner.lock().timeline.pending()
    }
}

impl OutputSink for MemorySink {
    fn now(&self) -> DeviceTime {
        self.inner.lock().timeline.now()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.lock().timeline.sample_rate()
    }

    fn state(&self) -> SinkState {
        self.inner.lock().state
    }

    fn resume(&mut self) -> PlaybackResult<()> {
        let mut inner = self.inner.lock();
        inner.resume_calls += 1;
        match inner.state {
            SinkState::Closed => Err(PlaybackError::SinkClosed),
            SinkState::Running => Ok(()),
            SinkState::Suspended => {
                if let Some(reason) = inner.resume_failure.take() {
                    return Err(PlaybackError::Resume(reason));
                }
                inner.state = SinkState::Running;
                Ok(())
            }
        }
    }

    fn schedule_buffer(&mut self, buffer: MonoBuffer, start: DeviceTime) -> PlaybackResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_closed() {
            return Err(PlaybackError::SinkClosed);
        }
        inner.timeline.schedule(buffer.clone(), start)?;
        inner.scheduled.push(ScheduledBuffer { buffer, start });
        Ok(())
    }

    fn close(&mut self) -> PlaybackResult<()> {
        let mut inner = self.inner.lock();
        inner.state = SinkState::Closed;
        inner.timeline.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_only_moves_while_running() {
        let mut sink = MemorySink::suspended(1000);
        assert_eq!(sink.advance(Duration::from_millis(10)), 0);
        assert_eq!(sink.now(), DeviceTime::ZERO);

        sink.resume().unwrap();
        assert_eq!(sink.advance(Duration::from_millis(10)), 10);
        assert_eq!(sink.now(), DeviceTime::from_frames(10, 1000));
    }

    #[test]
    fn test_resume_is_idempotent() {
        let mut sink = MemorySink::new(1000);
        sink.advance_frames(5);
        let before = sink.now();

        sink.resume().unwrap();
        sink.resume().unwrap();

        assert_eq!(sink.state(), SinkState::Running);
        assert_eq!(sink.now(), before);
        assert_eq!(sink.resume_calls(), 2);
    }

    #[test]
    fn test_injected_resume_failure() {
        let mut sink = MemorySink::suspended(1000);
        sink.fail_next_resume("autoplay blocked");
        assert_eq!(
            sink.resume().unwrap_err(),
            PlaybackError::Resume("autoplay blocked".to_string())
        );
        assert_eq!(sink.state(), SinkState::Suspended);
        sink.resume().unwrap();
        assert_eq!(sink.state(), SinkState::Running);
    }

    #[test]
    fn test_scheduled_audio_is_rendered_at_its_start() {
        let mut sink = MemorySink::new(4);
        sink.schedule_buffer(
            MonoBuffer::new(vec![0.5, -0.5], 4),
            DeviceTime::from_frames(2, 4),
        )
        .unwrap();

        sink.advance_frames(4);
        assert_eq!(sink.rendered(), vec![0.0, 0.0, 0.5, -0.5]);
        assert_eq!(sink.scheduled().len(), 1);
        assert_eq!(sink.take_rendered().len(), 4);
        assert!(sink.rendered().is_empty());
    }

    #[test]
    fn test_scheduled_record_drains() {
        let mut sink = MemorySink::new(4);
        assert_eq!(sink.sample_rate(), 4);
        for frame in 0..3 {
            sink.schedule_buffer(
                MonoBuffer::new(vec![0.25], 4),
                DeviceTime::from_frames(frame, 4),
            )
            .unwrap();
        }

        let taken = sink.take_scheduled();
        assert_eq!(taken.len(), 3);
        assert_eq!(taken[2].start, DeviceTime::from_frames(2, 4));
        assert!(sink.scheduled().is_empty());

        // Draining the record leaves the queued audio alone.
        assert_eq!(sink.pending(), 3);
        sink.advance_frames(4);
        assert_eq!(sink.take_rendered(), vec![0.25, 0.25, 0.25, 0.0]);
    }

    #[test]
    fn test_closed_sink_rejects_buffers() {
        let mut sink = MemorySink::new(4);
        sink.close().unwrap();
        let err = sink
            .schedule_buffer(MonoBuffer::new(vec![0.0], 4), DeviceTime::ZERO)
            .unwrap_err();
        assert_eq!(err, PlaybackError::SinkClosed);
        assert_eq!(sink.resume().unwrap_err(), PlaybackError::SinkClosed);
    }
}
