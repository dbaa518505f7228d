//! Error types and result utilities for the streaming scheduler.

use crate::playback::PlaybackError;
use thiserror::Error;

/// Convenience type alias for results that may contain a [`DacError`].
pub type DacResult<T> = Result<T, DacError>;

/// Error types surfaced to the host of the scheduler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DacError {
    /// The output sink failed: it could not be resumed, it was closed, or the device went away.
    ///
    /// A failed `start()` leaves the scheduler stopped with its cursor untouched.
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// Error that occurs when invalid parameters are provided.
    ///
    /// This includes cases like a zero sample rate in the configuration.
    #[error("Invalid parameter error: {0}")]
    InvalidParameter(String),

    /// The driver task is no longer running, so the command could not be delivered.
    #[error("Driver closed: {0}")]
    DriverClosed(String),
}

impl DacError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(details: impl Into<String>) -> Self {
        Self::InvalidParameter(details.into())
    }

    /// Create a driver closed error
    pub fn driver_closed(operation: impl Into<String>) -> Self {
        Self::DriverClosed(operation.into())
    }

    /// Check if this error originates from the output device
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Playback(err) if err.is_device_error())
    }
}
