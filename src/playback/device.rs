//! Output sink backed by a cpal device.
//!
//! cpal streams cannot be moved between threads on every platform, so the stream lives on a
//! dedicated keeper thread for its whole life. The sink itself only holds the shared
//! [`Timeline`] (rendered from the audio callback) and a command channel to the keeper, which
//! makes it `Send` and lets it be owned by the scheduler's driver task.

use super::buffer::MonoBuffer;
use super::error::{PlaybackError, PlaybackResult};
use super::timeline::Timeline;
use super::traits::{OutputSink, SinkState};
use crate::time::DeviceTime;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Configuration for opening an output device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSinkConfig {
    /// Preferred audio device (None = use default)
    pub device_name: Option<String>,

    /// Fixed callback size in frames (None = backend default)
    pub buffer_size: Option<u32>,
}

impl DeviceSinkConfig {
    /// Set preferred device
    pub fn with_device(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    /// Set callback buffer size
    pub fn with_buffer_size(mut self, frames: u32) -> Self {
        self.buffer_size = Some(frames);
        self
    }
}

enum StreamCommand {
    Play(Sender<PlaybackResult<()>>),
    Close,
}

/// An [`OutputSink`] that plays through a cpal output device.
///
/// The device opens suspended: the stream is built but not started, and the device clock does
/// not move until [`OutputSink::resume`] is called. The clock is the number of frames the audio
/// callback has rendered.
pub struct DeviceSink {
    sample_rate: u32,
    channels: u16,
    device_name: String,
    timeline: Arc<Mutex<Timeline>>,
    state: SinkState,
    commands: Sender<StreamCommand>,
    keeper: Option<JoinHandle<()>>,
}

impl DeviceSink {
    /// Open the configured device at `sample_rate`.
    pub fn open(sample_rate: u32, config: DeviceSinkConfig) -> PlaybackResult<Self> {
        let timeline = Arc::new(Mutex::new(Timeline::new(sample_rate)));
        let (commands, command_rx) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);

        let keeper_timeline = Arc::clone(&timeline);
        let keeper = std::thread::Builder::new()
            .name("dac-stream-output".to_string())
            .spawn(move || {
                run_stream_keeper(sample_rate, &config, keeper_timeline, command_rx, ready_tx)
            })
            .map_err(|err| PlaybackError::device(format!("failed to spawn output thread: {err}")))?;

        let (device_name, channels) = match ready_rx.recv() {
            Ok(Ok(opened)) => opened,
            Ok(Err(err)) => {
                let _ = keeper.join();
                return Err(err);
            }
            Err(_) => {
                let _ = keeper.join();
                return Err(PlaybackError::device(
                    "output thread exited before opening the stream",
                ));
            }
        };

        tracing::debug!(device = %device_name, sample_rate, channels, "output device opened");

        Ok(Self {
            sample_rate,
            channels,
            device_name,
            timeline,
            state: SinkState::Suspended,
            commands,
            keeper: Some(keeper),
        })
    }

    /// Open the default output device.
    pub fn open_default(sample_rate: u32) -> PlaybackResult<Self> {
        Self::open(sample_rate, DeviceSinkConfig::default())
    }

    /// Name of the opened device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Number of device channels the mono signal is copied to
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Device time at which the last queued buffer finishes.
    pub fn queued_until(&self) -> DeviceTime {
        self.timeline.lock().queued_until()
    }
}

impl OutputSink for DeviceSink {
    fn now(&self) -> DeviceTime {
        self.timeline.lock().now()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn resume(&mut self) -> PlaybackResult<()> {
        match self.state {
            SinkState::Running => Ok(()),
            SinkState::Closed => Err(PlaybackError::SinkClosed),
            SinkState::Suspended => {
                let (reply_tx, reply_rx) = channel::bounded(1);
                self.commands
                    .send(StreamCommand::Play(reply_tx))
                    .map_err(|_| PlaybackError::resume("output thread is gone"))?;
                reply_rx
                    .recv()
                    .map_err(|_| PlaybackError::resume("output thread is gone"))??;
                self.state = SinkState::Running;
                tracing::debug!(device = %self.device_name, "output resumed");
                Ok(())
            }
        }
    }

    fn schedule_buffer(&mut self, buffer: MonoBuffer, start: DeviceTime) -> PlaybackResult<()> {
        if self.state.is_closed() {
            return Err(PlaybackError::SinkClosed);
        }
        self.timeline.lock().schedule(buffer, start)?;
        Ok(())
    }

    fn close(&mut self) -> PlaybackResult<()> {
        if let Some(keeper) = self.keeper.take() {
            let _ = self.commands.send(StreamCommand::Close);
            if keeper.join().is_err() {
                tracing::warn!(device = %self.device_name, "output thread panicked");
            }
            self.timeline.lock().clear();
        }
        self.state = SinkState::Closed;
        Ok(())
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn run_stream_keeper(
    sample_rate: u32,
    config: &DeviceSinkConfig,
    timeline: Arc<Mutex<Timeline>>,
    commands: Receiver<StreamCommand>,
    ready: Sender<PlaybackResult<(String, u16)>>,
) {
    let stream = match build_stream(sample_rate, config, timeline) {
        Ok((stream, name, channels)) => {
            let _ = ready.send(Ok((name, channels)));
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    // Runs until Close or until the sink is dropped.
    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Play(reply) => {
                let _ = reply.send(stream.play().map_err(PlaybackError::from));
            }
            StreamCommand::Close => break,
        }
    }

    drop(stream);
    tracing::debug!("output stream closed");
}

fn build_stream(
    sample_rate: u32,
    config: &DeviceSinkConfig,
    timeline: Arc<Mutex<Timeline>>,
) -> PlaybackResult<(cpal::Stream, String, u16)> {
    let host = cpal::default_host();
    let device = select_device(&host, config.device_name.as_deref())?;
    let name = device.name()?;

    let range = device
        .supported_output_configs()?
        .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
        .filter(|range| {
            range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
        })
        .min_by_key(|range| range.channels())
        .ok_or_else(|| {
            PlaybackError::DeviceConfig(format!("{name} cannot play f32 audio at {sample_rate}Hz"))
        })?;

    let channels = range.channels();
    let mut stream_config = range
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .config();
    if let Some(frames) = config.buffer_size {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }

    let callback_channels = channels as usize;
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            timeline.lock().render(data, callback_channels);
        },
        |err| {
            tracing::error!(%err, "output stream error");
        },
        None,
    )?;

    // Some backends start a stream as soon as it is built; hold it until resume().
    if let Err(err) = stream.pause() {
        tracing::debug!(%err, "backend cannot pause a fresh stream");
    }

    Ok((stream, name, channels))
}

fn select_device(host: &cpal::Host, name: Option<&str>) -> PlaybackResult<cpal::Device> {
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| PlaybackError::device_not_found("default output")),
        Some(wanted) => {
            for device in host.output_devices()? {
                if device.name().is_ok_and(|name| name == wanted) {
                    return Ok(device);
                }
            }
            Err(PlaybackError::device_not_found(wanted))
        }
    }
}
