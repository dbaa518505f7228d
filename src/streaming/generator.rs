//! Signal generator source for streaming audio.
//!
//! Every sample is a pure function of its index, so a generator can answer requests for any
//! position in any order, and a restarted session hears exactly what the first one did.

use super::source::BatchProducer;
use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Types of signals that can be generated.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum SignalType {
    /// Pure sine wave
    Sine { frequency: f64 },
    /// Square wave, high for `duty_cycle` of each period
    Square { frequency: f64, duty_cycle: f64 },
    /// Sawtooth wave
    Sawtooth { frequency: f64 },
    /// Triangle wave
    Triangle { frequency: f64 },
    /// White noise
    WhiteNoise,
    /// Linear frequency sweep, repeated every `sweep`
    Chirp {
        start_freq: f64,
        end_freq: f64,
        sweep: Duration,
    },
    /// Silence (zeros)
    Silence,
}

/// Configuration for the signal generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Waveform to synthesise
    pub signal_type: SignalType,
    /// Peak amplitude
    pub amplitude: f64,
    /// Sample rate the frequencies are relative to
    pub sample_rate: u32,
    /// Samples per produced batch
    pub batch_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            signal_type: SignalType::Sine { frequency: 440.0 },
            amplitude: 0.5,
            sample_rate: 44100,
            batch_size: 1024,
        }
    }
}

/// A batch producer that synthesises a periodic signal or noise.
#[derive(Debug, Clone)]
pub struct GeneratorSource {
    config: GeneratorConfig,
    batches_produced: u64,
}

impl GeneratorSource {
    /// Create a new signal generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            batches_produced: 0,
        }
    }

    /// Create a sine wave generator.
    pub fn sine(frequency: f64, sample_rate: u32) -> Self {
        Self::new(GeneratorConfig {
            signal_type: SignalType::Sine { frequency },
            sample_rate,
            ..Default::default()
        })
    }

    /// Create a white noise generator.
    pub fn white_noise(sample_rate: u32) -> Self {
        Self::new(GeneratorConfig {
            signal_type: SignalType::WhiteNoise,
            sample_rate,
            ..Default::default()
        })
    }

    /// Create a silence generator.
    pub fn silence(sample_rate: u32) -> Self {
        Self::new(GeneratorConfig {
            signal_type: SignalType::Silence,
            sample_rate,
            ..Default::default()
        })
    }

    /// Create a chirp generator (frequency sweep).
    pub fn chirp(start_freq: f64, end_freq: f64, sweep: Duration, sample_rate: u32) -> Self {
        Self::new(GeneratorConfig {
            signal_type: SignalType::Chirp {
                start_freq,
                end_freq,
                sweep,
            },
            sample_rate,
            ..Default::default()
        })
    }

    /// Set the number of samples per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the signal amplitude.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.config.amplitude = amplitude;
        self
    }

    /// Set the signal type.
    pub fn set_signal_type(&mut self, signal_type: SignalType) {
        self.config.signal_type = signal_type;
    }

    /// Current configuration
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Number of batches produced so far
    pub const fn batches_produced(&self) -> u64 {
        self.batches_produced
    }

    /// Generate `len` samples starting at `sample_index`.
    pub fn generate(&self, sample_index: u64, len: usize) -> Vec<f32> {
        (sample_index..sample_index + len as u64)
            .map(|index| (self.sample_at(index) * self.config.amplitude) as f32)
            .collect()
    }

    /// Raw signal value at `index`, before amplitude scaling.
    fn sample_at(&self, index: u64) -> f64 {
        let rate = self.config.sample_rate.max(1) as f64;

        match &self.config.signal_type {
            SignalType::Sine { frequency } => (2.0 * PI * phase(index, *frequency, rate)).sin(),

            SignalType::Square {
                frequency,
                duty_cycle,
            } => {
                if phase(index, *frequency, rate) < *duty_cycle {
                    1.0
                } else {
                    -1.0
                }
            }

            SignalType::Sawtooth { frequency } => 2.0 * phase(index, *frequency, rate) - 1.0,

            SignalType::Triangle { frequency } => {
                let phase = phase(index, *frequency, rate);
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }

            SignalType::WhiteNoise => {
                let mut hasher = DefaultHasher::new();
                index.hash(&mut hasher);
                let hash = hasher.finish();

                // Convert hash to -1.0..1.0 range
                (hash as f64 / u64::MAX as f64) * 2.0 - 1.0
            }

            SignalType::Chirp {
                start_freq,
                end_freq,
                sweep,
            } => {
                let sweep_len = (sweep.as_secs_f64() * rate).round().max(1.0) as u64;
                let t = (index % sweep_len) as f64 / rate;
                let slope = (end_freq - start_freq) / sweep.as_secs_f64().max(f64::EPSILON);
                // Phase is the integral of the instantaneous frequency.
                let cycles = start_freq * t + 0.5 * slope * t * t;
                (2.0 * PI * cycles.fract()).sin()
            }

            SignalType::Silence => 0.0,
        }
    }
}

/// Position within the cycle, in [0, 1), of sample `index`.
fn phase(index: u64, frequency: f64, rate: f64) -> f64 {
    let cycles = (index as f64 * frequency / rate).fract();
    if cycles < 0.0 { cycles + 1.0 } else { cycles }
}

impl BatchProducer for GeneratorSource {
    fn produce(&mut self, sample_index: u64) -> Vec<f32> {
        self.batches_produced += 1;
        self.generate(sample_index, self.config.batch_size)
    }
}
