//! Tests for the streaming loop as a whole.
//!
//! The scheduler tests drive [`StreamScheduler`] by hand against a [`MemorySink`], carrying out
//! every effect synchronously so the device clock and the request timer stay in lockstep. The
//! driver tests run the same loop on tokio with paused time.

use super::*;
use crate::config::DacConfig;
use crate::playback::MemorySink;
use std::time::Duration;

mod scheduler_tests;


/// Runs a scheduler against a sink and a producer, playing the part of the host.
pub(crate) struct Harness<P: BatchProducer> {
    pub scheduler: StreamScheduler<MemorySink>,
    pub sink: MemorySink,
    pub producer: P,
    pub timer: Option<(TimerToken, Duration)>,
    pub requests: Vec<u64>,
}

impl<P: BatchProducer> Harness<P> {
    pub fn new(config: DacConfig, producer: P) -> Self {
        let sink = MemorySink::new(config.sample_rate);
        let scheduler = StreamScheduler::new(sink.clone(), config).unwrap();
        Self {
            scheduler,
            sink,
            producer,
            timer: None,
            requests: Vec::new(),
        }
    }

    /// Deliver a message and keep answering requests until the loop waits on the timer.
    pub fn feed(&mut self, message: SchedulerMessage) {
        let mut queue = self.scheduler.handle(message).unwrap();
        while !queue.is_empty() {
            let mut next = Vec::new();
            for effect in queue {
                match effect {
                    Effect::RequestSamples(request) => {
                        self.requests.push(request.sample_index);
                        let batch = self.producer.produce(request.sample_index);
                        next.extend(self.scheduler.on_reply(request, batch).unwrap());
                    }
                    Effect::ArmTimer { token, delay } => self.timer = Some((token, delay)),
                    Effect::CancelTimer(token) => {
                        if self.timer.is_some_and(|(armed, _)| armed == token) {
                            self.timer = None;
                        }
                    }
                }
            }
            queue = next;
        }
    }

    /// Let the device clock run until the armed timer fires, then fire it.
    ///
    /// Returns `false` if no timer was armed.
    pub fn run_timer(&mut self) -> bool {
        let Some((token, delay)) = self.timer.take() else {
            return false;
        };
        self.sink.advance(delay);
        self.feed(SchedulerMessage::TimerFired(token));
        true
    }
}

/// A producer emitting a ramp, so every sample records its own index.
pub(crate) fn ramp(batch: usize) -> impl FnMut(u64) -> Vec<f32> + Send + 'static {
    move |index: u64| (index..index + batch as u64).map(|i| i as f32).collect()
}
