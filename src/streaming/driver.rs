//! Async driver that runs the scheduler on a tokio task.
//!
//! The driver task is the single owner of the [`StreamScheduler`] and its sink. Host commands,
//! sample-source replies and timer firings all arrive as messages on one channel and are
//! processed strictly one at a time, so the session clock is never touched concurrently.
//!
//! ```rust,no_run
//! use dac_stream::{DacConfig, DacDriver, GeneratorSource, MemorySink, spawn_producer};
//!
//! # async fn run() -> dac_stream::DacResult<()> {
//! let (handle, requests) = DacDriver::spawn(MemorySink::new(44100), DacConfig::default())?;
//! spawn_producer(GeneratorSource::sine(440.0, 44100), requests, &handle);
//!
//! handle.start().await?;
//! // ...
//! handle.stop().await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use super::scheduler::{
    Effect, SampleRequest, SchedulerMessage, SchedulerStats, StreamScheduler, TimerToken,
};
use super::source::BatchProducer;
use super::timer::RequestTimer;
use crate::config::DacConfig;
use crate::error::{DacError, DacResult};
use crate::playback::OutputSink;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot of the scheduler as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct DacStatus {
    /// Whether a session is streaming
    pub running: bool,
    /// Samples scheduled in the current (or last) session
    pub sample_cursor: u64,
    /// Sample index of the request awaiting a reply, if any
    pub outstanding_request: Option<u64>,
    /// Counters since the driver started
    pub stats: SchedulerStats,
    /// Failure that stopped the last session, cleared when a new session starts
    pub last_error: Option<DacError>,
}

enum Command {
    Start(oneshot::Sender<DacResult<()>>),
    Stop(oneshot::Sender<()>),
    Batch(Vec<f32>),
    Reply(SampleRequest, Vec<f32>),
    Abandon(oneshot::Sender<()>),
    TimerFired(TimerToken),
    Status(oneshot::Sender<DacStatus>),
    Shutdown(oneshot::Sender<DacResult<()>>),
}

/// Stream of requests addressed to the sample source.
///
/// Ends when the driver shuts down.
#[derive(Debug)]
pub struct SampleRequests {
    receiver: mpsc::UnboundedReceiver<SampleRequest>,
}

impl SampleRequests {
    /// Wait for the next request.
    pub async fn recv(&mut self) -> Option<SampleRequest> {
        self.receiver.recv().await
    }

    /// Take a request if one is waiting, without blocking.
    pub fn try_recv(&mut self) -> Option<SampleRequest> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for SampleRequests {
    type Item = SampleRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Cloneable handle to a running driver.
#[derive(Debug, Clone)]
pub struct DacHandle {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(_) => f.write_str("Start"),
            Self::Stop(_) => f.write_str("Stop"),
            Self::Batch(samples) => write!(f, "Batch({} samples)", samples.len()),
            Self::Reply(request, samples) => {
                write!(f, "Reply({}, {} samples)", request.sample_index, samples.len())
            }
            Self::Abandon(_) => f.write_str("Abandon"),
            Self::TimerFired(token) => write!(f, "TimerFired({})", token.sample_index()),
            Self::Status(_) => f.write_str("Status"),
            Self::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl DacHandle {
    /// Start streaming, resuming the sink if it is suspended.
    pub async fn start(&self) -> DacResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Start(reply), "start")?;
        response
            .await
            .map_err(|_| DacError::driver_closed("start"))?
    }

    /// Stop streaming. Audio already scheduled plays out.
    pub async fn stop(&self) -> DacResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stop(reply), "stop")?;
        response.await.map_err(|_| DacError::driver_closed("stop"))
    }

    /// Deliver the sample source's reply to the outstanding request.
    ///
    /// Never waits: the batch is queued for the driver task.
    pub fn provide_samples(&self, samples: Vec<f32>) -> DacResult<()> {
        self.send(Command::Batch(samples), "provide_samples")
    }

    /// Deliver the sample source's reply to `request`.
    ///
    /// Unlike [`provide_samples`](Self::provide_samples), a reply to a request that is no longer
    /// awaited is recognised as such however late it arrives.
    pub fn reply(&self, request: SampleRequest, samples: Vec<f32>) -> DacResult<()> {
        self.send(Command::Reply(request, samples), "reply")
    }

    /// Forget every reply the source still owes, asking again for the one the session needs.
    pub async fn abandon_request(&self) -> DacResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Abandon(reply), "abandon_request")?;
        response
            .await
            .map_err(|_| DacError::driver_closed("abandon_request"))
    }

    /// Read the scheduler's state and counters.
    pub async fn status(&self) -> DacResult<DacStatus> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status(reply), "status")?;
        response.await.map_err(|_| DacError::driver_closed("status"))
    }

    /// Stop streaming, close the sink and end the driver task.
    pub async fn shutdown(&self) -> DacResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown(reply), "shutdown")?;
        response
            .await
            .map_err(|_| DacError::driver_closed("shutdown"))?
    }

    /// Token cancelled when the driver ends; tasks serving the driver can watch it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check if the driver task has ended
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command, operation: &str) -> DacResult<()> {
        self.commands
            .send(command)
            .map_err(|_| DacError::driver_closed(operation))
    }
}

/// Spawns the scheduler onto the current tokio runtime.
pub struct DacDriver;

impl DacDriver {
    /// Spawn a driver owning `sink`.
    ///
    /// Returns the host handle and the stream of requests for the sample source. The driver runs
    /// until [`DacHandle::shutdown`] is called or every handle has been dropped; either way the
    /// sink is closed on the way out.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<S>(sink: S, config: DacConfig) -> DacResult<(DacHandle, SampleRequests)>
    where
        S: OutputSink + 'static,
    {
        let scheduler = StreamScheduler::new(sink, config)?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (request_tx, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let timer_commands = commands.downgrade();
        tokio::spawn(run(
            scheduler,
            command_rx,
            timer_commands,
            request_tx,
            cancel.clone(),
        ));

        Ok((DacHandle { commands, cancel }, SampleRequests { receiver }))
    }
}

async fn run<S: OutputSink>(
    mut scheduler: StreamScheduler<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    timer_commands: mpsc::WeakUnboundedSender<Command>,
    requests: mpsc::UnboundedSender<SampleRequest>,
    cancel: CancellationToken,
) {
    let mut timer = RequestTimer::new();
    let mut shutdown_reply = None;
    let mut last_error = None;

    while let Some(command) = commands.recv().await {
        match command {
            Command::Start(reply) => {
                let result = scheduler
                    .start()
                    .map(|effects| apply(effects, &mut timer, &requests, &timer_commands));
                match &result {
                    Ok(()) => last_error = None,
                    Err(err) => tracing::warn!(%err, "start failed"),
                }
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                let effects = scheduler.stop();
                apply(effects, &mut timer, &requests, &timer_commands);
                let _ = reply.send(());
            }
            Command::Batch(samples) => match scheduler.on_batch(samples) {
                Ok(effects) => apply(effects, &mut timer, &requests, &timer_commands),
                Err(err) => {
                    tracing::error!(%err, "session stopped after a scheduling failure");
                    timer.cancel_any();
                    last_error = Some(err);
                }
            },
            Command::Reply(request, samples) => match scheduler.on_reply(request, samples) {
                Ok(effects) => apply(effects, &mut timer, &requests, &timer_commands),
                Err(err) => {
                    tracing::error!(%err, "session stopped after a scheduling failure");
                    timer.cancel_any();
                    last_error = Some(err);
                }
            },
            Command::Abandon(reply) => {
                let effects = scheduler.abandon_request();
                apply(effects, &mut timer, &requests, &timer_commands);
                let _ = reply.send(());
            }
            Command::TimerFired(token) => {
                timer.fired(token);
                let effects = scheduler.on_timer(token);
                apply(effects, &mut timer, &requests, &timer_commands);
            }
            Command::Status(reply) => {
                let _ = reply.send(DacStatus {
                    running: scheduler.is_running(),
                    sample_cursor: scheduler.sample_cursor(),
                    outstanding_request: scheduler.outstanding_request(),
                    stats: scheduler.stats().clone(),
                    last_error: last_error.clone(),
                });
            }
            Command::Shutdown(reply) => {
                shutdown_reply = Some(reply);
                break;
            }
        }
    }

    timer.cancel_any();
    let result = scheduler.close().map(|_| ());
    if let Err(err) = &result {
        tracing::warn!(%err, "failed to close output sink");
    }
    cancel.cancel();
    tracing::debug!(stats = ?scheduler.stats(), "driver stopped");

    if let Some(reply) = shutdown_reply {
        let _ = reply.send(result);
    }
}

fn apply(
    effects: Vec<Effect>,
    timer: &mut RequestTimer,
    requests: &mpsc::UnboundedSender<SampleRequest>,
    timer_commands: &mpsc::WeakUnboundedSender<Command>,
) {
    for effect in effects {
        match effect {
            Effect::RequestSamples(request) => {
                if requests.send(request).is_err() {
                    tracing::debug!(
                        sample_index = request.sample_index,
                        "sample source is gone, request dropped"
                    );
                }
            }
            Effect::ArmTimer { token, delay } => {
                let commands = timer_commands.clone();
                timer.arm(token, delay, move |token| {
                    if let Some(commands) = commands.upgrade() {
                        let _ = commands.send(Command::TimerFired(token));
                    }
                });
            }
            Effect::CancelTimer(token) => timer.cancel(token),
        }
    }
}

/// Serve `requests` with `producer`, replying through `handle`.
///
/// The task does not keep the driver alive: it ends when the request stream ends, the driver
/// shuts down, or every host handle has been dropped.
pub fn spawn_producer<P>(
    mut producer: P,
    mut requests: SampleRequests,
    handle: &DacHandle,
) -> JoinHandle<()>
where
    P: BatchProducer,
{
    let cancel = handle.cancellation_token();
    let replies = handle.commands.downgrade();
    tokio::spawn(async move {
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let batch = producer.produce(request.sample_index);
            let Some(commands) = replies.upgrade() else {
                break;
            };
            if commands.send(Command::Reply(request, batch)).is_err() {
                break;
            }
        }
        tracing::trace!("producer task finished");
    })
}
