//! Error types for audio output operations.

/// Playback-specific error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    /// Device-related errors
    #[error("Device error: {0}")]
    Device(String),

    /// Device not found or unavailable
    #[error("Device not found: {device_name}")]
    DeviceNotFound { device_name: String },

    /// Device configuration issues
    #[error("Device configuration error: {0}")]
    DeviceConfig(String),

    /// The sink was torn down and can no longer schedule audio
    #[error("Output sink is closed")]
    SinkClosed,

    /// The suspended device refused to resume
    #[error("Failed to resume output: {0}")]
    Resume(String),

    /// A buffer was built at a different rate than the sink runs at
    #[error("Sample rate mismatch: sink runs at {expected}Hz, buffer is {actual}Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    /// Backend-specific errors (CPAL, etc.)
    #[error("Backend error: {backend} - {details}")]
    Backend {
        backend: &'static str,
        details: String,
    },
}

impl PlaybackError {
    /// Create a device error
    pub fn device(details: impl Into<String>) -> Self {
        Self::Device(details.into())
    }

    /// Create a device not found error
    pub fn device_not_found(device_name: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            device_name: device_name.into(),
        }
    }

    /// Create a resume error
    pub fn resume(details: impl Into<String>) -> Self {
        Self::Resume(details.into())
    }

    /// Create a backend error
    pub fn backend(backend: &'static str, details: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            details: details.into(),
        }
    }

    /// Check if this error indicates a device problem
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::Device(_)
                | Self::DeviceNotFound { .. }
                | Self::DeviceConfig(_)
                | Self::SinkClosed
                | Self::Resume(_)
        )
    }
}

/// Result type for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Convert CPAL errors to PlaybackError
#[cfg(feature = "playback")]
impl From<cpal::BuildStreamError> for PlaybackError {
    fn from(err: cpal::BuildStreamError) -> Self {
        Self::backend("cpal", format!("Failed to build stream: {}", err))
    }
}

#[cfg(feature = "playback")]
impl From<cpal::PlayStreamError> for PlaybackError {
    fn from(err: cpal::PlayStreamError) -> Self {
        Self::backend("cpal", format!("Failed to play stream: {}", err))
    }
}

#[cfg(feature = "playback")]
impl From<cpal::PauseStreamError> for PlaybackError {
    fn from(err: cpal::PauseStreamError) -> Self {
        Self::backend("cpal", format!("Failed to pause stream: {}", err))
    }
}

#[cfg(feature = "playback")]
impl From<cpal::DevicesError> for PlaybackError {
    fn from(err: cpal::DevicesError) -> Self {
        Self::backend("cpal", format!("Failed to enumerate devices: {}", err))
    }
}

#[cfg(feature = "playback")]
impl From<cpal::DeviceNameError> for PlaybackError {
    fn from(err: cpal::DeviceNameError) -> Self {
        Self::backend("cpal", format!("Failed to read device name: {}", err))
    }
}

#[cfg(feature = "playback")]
impl From<cpal::SupportedStreamConfigsError> for PlaybackError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        Self::backend(
            "cpal",
            format!("Failed to get supported stream configs: {}", err),
        )
    }
}
