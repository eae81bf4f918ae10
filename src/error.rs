//! Error types for the voice session

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session loop has shut down")]
    LoopClosed,
}

/// Microphone acquisition errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No microphone found: {0}")]
    NotFound(String),

    #[error("Microphone unavailable: {0}")]
    Unavailable(String),
}

/// Audio stream errors (output device, stream lifecycle)
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to close device: {0}")]
    CloseFailed(String),
}

/// Sample codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed PCM frame: {0}")]
    Format(String),

    #[error("Invalid transport text: {0}")]
    Text(String),
}

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to open session: {0}")]
    Open(String),

    #[error("Session error: {0}")]
    Runtime(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Close failed: {0}")]
    Close(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
