//! Request-ahead streaming of batch-produced samples.
//!
//! This module provides:
//! - [`StreamScheduler`]: the session clock and the request-ahead loop, as a synchronous state
//!   machine over an [`OutputSink`](crate::playback::OutputSink)
//! - [`BatchProducer`]: the sample source side of the request/reply contract
//! - [`GeneratorSource`]: deterministic test signals that answer any request index
//! - `driver`: a tokio task running the scheduler with real timers (requires the `streaming`
//!   feature)
//!
//! # Example
//!
//! ```rust
//! use dac_stream::streaming::*;
//! use dac_stream::{DacConfig, MemorySink};
//!
//! let sink = MemorySink::new(1000);
//! let mut scheduler = StreamScheduler::new(sink.clone(), DacConfig::new(1000))?;
//! let mut source = GeneratorSource::sine(100.0, 1000).with_batch_size(100);
//!
//! for effect in scheduler.start()? {
//!     if let Effect::RequestSamples(request) = effect {
//!         scheduler.on_batch(source.produce(request.sample_index))?;
//!     }
//! }
//! assert_eq!(scheduler.sample_cursor(), 100);
//! # Ok::<(), dac_stream::DacError>(())
//! ```

pub mod generator;
pub mod scheduler;
pub mod source;

#[cfg(feature = "streaming")]
pub mod driver;

#[cfg(feature = "streaming")]
mod timer;

#[cfg(test)]
mod tests;

// Re-export main types for convenience
pub use generator::{GeneratorConfig, GeneratorSource, SignalType};
pub use scheduler::{
    Effect, SampleRequest, SchedulerMessage, SchedulerState, SchedulerStats, StreamScheduler,
    TimerToken,
};
pub use source::BatchProducer;

#[cfg(feature = "streaming")]
pub use driver::{DacDriver, DacHandle, DacStatus, SampleRequests, spawn_producer};
