// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)]
// Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::identity_op)] // e.g., `x + 0`, `x * 1`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![warn(clippy::missing_safety_doc)] // Docs for `unsafe` functions
#![warn(missing_docs)]

//! # dac_stream
//!
//! Streams a continuously generated mono signal to an output device without gaps or overlaps,
//! while the signal source produces samples in batches on demand.
//!
//! ## Overview
//!
//! The crate is built around a small, timing-sensitive core:
//!
//! - [`playback`]: the output sink capability (`now`, `resume`, `schedule_buffer`), an
//!   in-memory sink for offline rendering and tests, and a cpal-backed device sink behind the
//!   `playback` feature.
//! - [`streaming`]: the [`StreamScheduler`] state machine that owns the sample cursor and the
//!   request-ahead loop, signal generators, and an async driver behind the `streaming` feature.
//!
//! Every batch is scheduled at `start_time + sample_cursor / sample_rate` on the device clock, so
//! consecutive buffers butt up against each other sample-accurately no matter when the source
//! actually replies. The next batch is requested at the moment the previous one starts playing,
//! hiding production latency behind one batch of playback.
//!
//! ## Features
//!
//! - `streaming` (default): tokio driver, request-ahead timer and producer tasks.
//! - `playback`: cpal output device sink.
//! - `realtime`: both of the above.
//!
//! ## Quick Start
//!
//! Driving the scheduler by hand against the in-memory sink:
//!
//! ```rust
//! use dac_stream::{DacConfig, Effect, MemorySink, StreamScheduler};
//!
//! let sink = MemorySink::new(44100);
//! let mut scheduler = StreamScheduler::new(sink.clone(), DacConfig::default())?;
//!
//! let effects = scheduler.start()?;
//! assert!(matches!(effects[..], [Effect::RequestSamples(request)] if request.sample_index == 0));
//!
//! scheduler.on_batch(vec![0.0; 512])?;
//! assert_eq!(scheduler.sample_cursor(), 512);
//! assert_eq!(sink.scheduled().len(), 1);
//! # Ok::<(), dac_stream::DacError>(())
//! ```
//!
//! With the `streaming` feature the [`streaming::driver`] module runs the same state machine on a
//! tokio task, with real timers and a request stream a producer can subscribe to.
//!
//! ## Error Handling
//!
//! ```rust
//! use dac_stream::{DacError, DacResult, PlaybackError};
//!
//! let result: DacResult<()> = Err(DacError::Playback(PlaybackError::SinkClosed));
//!
//! match result {
//!     Ok(()) => {}
//!     Err(DacError::Playback(err)) if err.is_device_error() => eprintln!("Device gone: {err}"),
//!     Err(other) => eprintln!("Other error: {other}"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod playback;
pub mod streaming;
pub mod time;

pub use config::{DacConfig, RestartPolicy};
pub use error::{DacError, DacResult};
pub use playback::{
    MemorySink, MonoBuffer, OutputSink, PlaybackError, PlaybackResult, ScheduledBuffer,
    SinkState, Timeline,
};
pub use streaming::{
    BatchProducer, Effect, GeneratorConfig, GeneratorSource, SampleRequest, SchedulerMessage,
    SchedulerState, SchedulerStats, SignalType, StreamScheduler, TimerToken,
};
pub use time::DeviceTime;

#[cfg(feature = "streaming")]
pub use streaming::driver::{DacDriver, DacHandle, DacStatus, SampleRequests, spawn_producer};

#[cfg(feature = "playback")]
pub use playback::device::{DeviceSink, DeviceSinkConfig};
