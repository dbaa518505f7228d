//! The streaming scheduler.
//!
//! [`StreamScheduler`] owns the session clock (`start_time`, `sample_cursor`, running flag) and
//! turns batches from the sample source into buffers scheduled on the output sink. It is a
//! synchronous state machine: every transition takes one [`SchedulerMessage`] and returns the
//! [`Effect`]s the host must carry out (ask the source for samples, arm or cancel the
//! request-ahead timer). Nothing in here sleeps or spawns, so the whole loop can be driven
//! step by step against a [`MemorySink`](crate::playback::MemorySink).
//!
//! # Request-ahead
//!
//! When batch *N* arrives it is scheduled at `start_time + sample_cursor / sample_rate` and a
//! timer is armed to fire when that position is reached on the device clock. The timer requests
//! batch *N+1*, so the source has the whole playing time of batch *N* to produce it. If the
//! batch arrives after its own start position has already passed, the next request goes out
//! immediately and the scheduler carries on from the exact computed positions: it never skips
//! ahead to catch up.
//!
//! # Outstanding requests
//!
//! Within a session each request is answered before the next one is issued. Starting a new
//! session abandons a reply the previous one was still owed and asks for index 0 straight away,
//! so a source that never answers cannot wedge the loop. Abandoned replies are discarded when
//! they land: replies passed to [`StreamScheduler::on_reply`] are matched by request id, and
//! untagged replies passed to [`StreamScheduler::on_batch`] are assumed to arrive in request
//! order. [`StreamScheduler::abandon_request`] forgets every owed reply for sources that lose
//! requests outright.

use crate::config::{DacConfig, RestartPolicy};
use crate::error::DacResult;
use crate::playback::{MonoBuffer, OutputSink, PlaybackError, SinkState};
use crate::time::DeviceTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Initial and terminal state: batches are discarded, nothing is requested
    Stopped,
    /// A session is streaming
    Running,
}

impl SchedulerState {
    /// Check if a session is streaming
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A request for the batch starting at `sample_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRequest {
    /// Identifies this request; hand it back with the reply
    pub id: u64,
    /// Index, counted from the session start, of the first sample of the requested batch
    pub sample_index: u64,
}

/// Identifies one armed request-ahead timer.
///
/// A timer that fires after it was cancelled, or after its session ended, carries a token the
/// scheduler no longer recognises and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    session: u64,
    sample_index: u64,
}

impl TimerToken {
    pub(crate) const fn new(session: u64, sample_index: u64) -> Self {
        Self {
            session,
            sample_index,
        }
    }

    /// Sample index the timer will request when it fires
    pub const fn sample_index(&self) -> u64 {
        self.sample_index
    }
}

/// Inputs to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerMessage {
    /// Host asks to start (or restart) streaming
    Start,
    /// Host asks to stop streaming
    Stop,
    /// The sample source replied with a batch, without saying to which request
    Batch(Vec<f32>),
    /// The sample source replied to `request`
    Reply {
        /// The request being answered
        request: SampleRequest,
        /// The batch
        samples: Vec<f32>,
    },
    /// A request-ahead timer fired
    TimerFired(TimerToken),
}

/// Work the host must carry out on the scheduler's behalf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Send a request to the sample source
    RequestSamples(SampleRequest),
    /// Arm a one-shot timer; when it fires, deliver [`SchedulerMessage::TimerFired`]
    ArmTimer {
        /// Token to deliver back
        token: TimerToken,
        /// How long from now the timer fires
        delay: Duration,
    },
    /// Cancel a previously armed timer
    CancelTimer(TimerToken),
}

/// Counters describing the scheduler's behaviour since it was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Sessions started
    pub sessions_started: u64,
    /// Requests sent to the sample source
    pub requests_issued: u64,
    /// Batches scheduled on the sink
    pub batches_scheduled: u64,
    /// Samples scheduled on the sink
    pub samples_scheduled: u64,
    /// Batches that arrived after their start position had passed
    pub late_batches: u64,
    /// Replies discarded because no running session was waiting for them
    pub stale_replies: u64,
    /// Worst observed lateness in milliseconds
    pub max_lateness_ms: f64,
}

impl SchedulerStats {
    /// Fraction of scheduled batches that arrived late (0.0 to 1.0)
    pub fn late_ratio(&self) -> f64 {
        if self.batches_scheduled == 0 {
            0.0
        } else {
            self.late_batches as f64 / self.batches_scheduled as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    id: u64,
    start_time: DeviceTime,
    sample_cursor: u64,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: u64,
    session: u64,
    sample_index: u64,
}

/// Sample-accurate request-ahead scheduler over an injected output sink.
pub struct StreamScheduler<S: OutputSink> {
    sink: S,
    config: DacConfig,
    session: Session,
    running: bool,
    in_flight: Option<InFlight>,
    abandoned: VecDeque<InFlight>,
    next_request_id: u64,
    pending_timer: Option<TimerToken>,
    stats: SchedulerStats,
}

impl<S: OutputSink> StreamScheduler<S> {
    /// Create a stopped scheduler that owns `sink`.
    ///
    /// Fails if the configuration is invalid or its sample rate differs from the sink's.
    pub fn new(sink: S, config: DacConfig) -> DacResult<Self> {
        config.validate()?;
        let sink_rate = sink.sample_rate();
        if sink_rate != config.sample_rate {
            return Err(PlaybackError::SampleRateMismatch {
                expected: sink_rate,
                actual: config.sample_rate,
            }
            .into());
        }
        Ok(Self {
            sink,
            config,
            session: Session {
                id: 0,
                start_time: DeviceTime::ZERO,
                sample_cursor: 0,
            },
            running: false,
            in_flight: None,
            abandoned: VecDeque::new(),
            next_request_id: 0,
            pending_timer: None,
            stats: SchedulerStats::default(),
        })
    }

    /// Feed one message through the state machine.
    pub fn handle(&mut self, message: SchedulerMessage) -> DacResult<Vec<Effect>> {
        match message {
            SchedulerMessage::Start => self.start(),
            SchedulerMessage::Stop => Ok(self.stop()),
            SchedulerMessage::Batch(samples) => self.on_batch(samples),
            SchedulerMessage::Reply { request, samples } => self.on_reply(request, samples),
            SchedulerMessage::TimerFired(token) => Ok(self.on_timer(token)),
        }
    }

    /// Start a session, resuming a suspended sink first.
    ///
    /// On success the session clock is anchored at the sink's current time, the cursor is zero
    /// and the first batch (index 0) is requested, abandoning any reply the previous session was
    /// still owed. If the sink is closed or refuses to resume,
    /// the error is returned and the scheduler is left exactly as it was.
    pub fn start(&mut self) -> DacResult<Vec<Effect>> {
        if self.running && self.config.restart_policy == RestartPolicy::Ignore {
            tracing::debug!(session = self.session.id, "already running, start ignored");
            return Ok(Vec::new());
        }

        match self.sink.state() {
            SinkState::Closed => return Err(PlaybackError::SinkClosed.into()),
            SinkState::Suspended => self.sink.resume()?,
            SinkState::Running => {}
        }

        let mut effects = Vec::new();
        if let Some(token) = self.pending_timer.take() {
            effects.push(Effect::CancelTimer(token));
        }
        if let Some(owed) = self.in_flight.take() {
            tracing::debug!(
                sample_index = owed.sample_index,
                session = owed.session,
                "owed reply abandoned by restart"
            );
            self.abandoned.push_back(owed);
        }

        self.session = Session {
            id: self.session.id + 1,
            start_time: self.sink.now(),
            sample_cursor: 0,
        };
        self.running = true;
        self.stats.sessions_started += 1;
        tracing::debug!(
            session = self.session.id,
            start_time = %self.session.start_time,
            sample_rate = self.config.sample_rate,
            "session started"
        );

        effects.extend(self.request(0));
        Ok(effects)
    }

    /// Stop the running session.
    ///
    /// Audio already handed to the sink keeps playing and an outstanding request is not
    /// recalled; its reply will be discarded when it arrives.
    pub fn stop(&mut self) -> Vec<Effect> {
        if !self.running {
            return Vec::new();
        }
        self.running = false;
        tracing::debug!(
            session = self.session.id,
            sample_cursor = self.session.sample_cursor,
            "session stopped"
        );

        self.pending_timer
            .take()
            .map(Effect::CancelTimer)
            .into_iter()
            .collect()
    }

    /// Schedule a batch from the sample source.
    ///
    /// The batch is played starting at `start_time + sample_cursor / sample_rate`, the cursor
    /// advances by its length, and the request for the following batch is timed to go out when
    /// this batch starts playing. Replies nobody is waiting for are dropped.
    ///
    /// The batch is taken as the reply to the oldest request still owed a reply, so replies to
    /// abandoned requests are consumed first. Use [`on_reply`](Self::on_reply) when the source
    /// can say which request it is answering.
    pub fn on_batch(&mut self, samples: Vec<f32>) -> DacResult<Vec<Effect>> {
        if let Some(owed) = self.abandoned.pop_front() {
            self.stats.stale_replies += 1;
            tracing::trace!(
                sample_index = owed.sample_index,
                "reply to an abandoned request discarded"
            );
            return Ok(Vec::new());
        }

        let Some(in_flight) = self.in_flight.take() else {
            self.stats.stale_replies += 1;
            tracing::trace!(len = samples.len(), "unsolicited batch discarded");
            return Ok(Vec::new());
        };
        self.accept(in_flight, samples)
    }

    /// Schedule the reply to `request`.
    ///
    /// Behaves like [`on_batch`](Self::on_batch) for the request currently awaited; replies to
    /// any other request are discarded.
    pub fn on_reply(
        &mut self,
        request: SampleRequest,
        samples: Vec<f32>,
    ) -> DacResult<Vec<Effect>> {
        if let Some(in_flight) = self.in_flight.filter(|in_flight| in_flight.id == request.id) {
            self.in_flight = None;
            return self.accept(in_flight, samples);
        }

        if let Some(position) = self.abandoned.iter().position(|owed| owed.id == request.id) {
            self.abandoned.remove(position);
        }
        self.stats.stale_replies += 1;
        tracing::trace!(
            request_id = request.id,
            sample_index = request.sample_index,
            "reply to a request that is no longer awaited discarded"
        );
        Ok(Vec::new())
    }

    /// Forget every reply still owed.
    ///
    /// For sources that can lose a request. If the running session was waiting on a reply, the
    /// same sample index is requested again.
    pub fn abandon_request(&mut self) -> Vec<Effect> {
        let forgotten = self.abandoned.len();
        self.abandoned.clear();

        let Some(owed) = self.in_flight.take() else {
            if forgotten > 0 {
                tracing::debug!(forgotten, "abandoned replies forgotten");
            }
            return Vec::new();
        };
        tracing::debug!(
            forgotten,
            sample_index = owed.sample_index,
            "outstanding request abandoned"
        );

        if self.running && owed.session == self.session.id {
            self.request(owed.sample_index)
        } else {
            Vec::new()
        }
    }

    fn accept(&mut self, in_flight: InFlight, samples: Vec<f32>) -> DacResult<Vec<Effect>> {
        if !self.running || in_flight.session != self.session.id {
            self.stats.stale_replies += 1;
            tracing::trace!(
                sample_index = in_flight.sample_index,
                session = in_flight.session,
                "batch arrived after its session ended, discarded"
            );
            return Ok(Vec::new());
        }

        let sample_rate = self.config.sample_rate;
        let start = self
            .session
            .start_time
            .offset_by_samples(self.session.sample_cursor, sample_rate);
        let len = samples.len() as u64;

        if let Err(err) = self
            .sink
            .schedule_buffer(MonoBuffer::new(samples, sample_rate), start)
        {
            tracing::error!(%err, session = self.session.id, "failed to schedule batch, stopping");
            self.running = false;
            return Err(err.into());
        }

        self.session.sample_cursor += len;
        self.stats.batches_scheduled += 1;
        self.stats.samples_scheduled += len;

        let now = self.sink.now();
        let delay_ms = start.millis_since(now);
        if delay_ms < 0.0 {
            self.stats.late_batches += 1;
            self.stats.max_lateness_ms = self.stats.max_lateness_ms.max(-delay_ms);
            tracing::debug!(
                session = self.session.id,
                late_ms = -delay_ms,
                start = %start,
                "batch arrived late"
            );
        }

        let next_index = self.session.sample_cursor;
        let wait = start
            .saturating_duration_since(now)
            .saturating_sub(self.config.request_lead);
        if wait.is_zero() {
            return Ok(self.request(next_index));
        }

        let token = TimerToken::new(self.session.id, next_index);
        self.pending_timer = Some(token);
        tracing::trace!(delay_ms, next_index, "request-ahead timer armed");
        Ok(vec![Effect::ArmTimer { token, delay: wait }])
    }

    /// A request-ahead timer fired.
    pub fn on_timer(&mut self, token: TimerToken) -> Vec<Effect> {
        if self.pending_timer != Some(token) {
            tracing::trace!(sample_index = token.sample_index, "stale timer ignored");
            return Vec::new();
        }
        self.pending_timer = None;

        if !self.running || token.session != self.session.id {
            return Vec::new();
        }
        self.request(token.sample_index)
    }

    /// Stop streaming and tear the sink down.
    pub fn close(&mut self) -> DacResult<Vec<Effect>> {
        let effects = self.stop();
        self.sink.close()?;
        Ok(effects)
    }

    fn request(&mut self, sample_index: u64) -> Vec<Effect> {
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.in_flight = Some(InFlight {
            id,
            session: self.session.id,
            sample_index,
        });
        self.stats.requests_issued += 1;
        vec![Effect::RequestSamples(SampleRequest { id, sample_index })]
    }

    /// Current state
    pub const fn state(&self) -> SchedulerState {
        if self.running {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Check if a session is streaming
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Samples scheduled in the current (or last) session
    pub const fn sample_cursor(&self) -> u64 {
        self.session.sample_cursor
    }

    /// Device time the current (or last) session started at
    pub const fn start_time(&self) -> DeviceTime {
        self.session.start_time
    }

    /// Sample index of the request awaiting a reply, if any
    pub fn outstanding_request(&self) -> Option<u64> {
        self.in_flight.map(|in_flight| in_flight.sample_index)
    }

    /// Replies owed to abandoned requests that have not landed yet
    pub fn abandoned_replies(&self) -> usize {
        self.abandoned.len()
    }

    /// The armed request-ahead timer, if any
    pub const fn pending_timer(&self) -> Option<TimerToken> {
        self.pending_timer
    }

    /// Counters since creation
    pub const fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Configuration in use
    pub const fn config(&self) -> &DacConfig {
        &self.config
    }

    /// The owned sink
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the owned sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give the sink back, dropping the scheduler.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
