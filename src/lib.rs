//! # Voice Morph
//!
//! Real-time, full-duplex voice transformation over a streaming speech session.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────────┐
//! │                         SESSION RUNNER (one tokio task)                      │
//! │                                                                              │
//! │   commands ──▶ ┌──────────────────────────────────────────────┐              │
//! │ (start/stop/   │   Session Controller (session::controller)   │              │
//! │  select voice) │  Idle → Starting → Active → Stopping → Idle  │              │
//! │                └───────┬───────────────▲──────────────┬───────┘              │
//! │                        │               │ Envelope     │                      │
//! │                        │               │ {epoch,event}│                      │
//! └────────────────────────┼───────────────┼──────────────┼──────────────────────┘
//!                          │               │              │
//!          ┌───────────────▼──┐   ┌────────┴─────────┐   ┌▼──────────────────┐
//!          │ Capture Pipeline │   │    Transport     │   │ Playback Scheduler│
//!          │ (audio::capture) │   │   (transport)    │   │ (audio::playback) │
//!          │                  │   │                  │   │                   │
//!          │ f32 block ──▶    │   │ ◀── audio/pcm    │   │ start = max(      │
//!          │ PCM16 ──▶ base64 │──▶│     realtime in  │   │   cursor, now)    │
//!          │      │           │   │                  │   │ cursor += dur     │
//!          │      ▼           │   │ ──▶ chunks,      │──▶│                   │
//!          │  Analyser tap ───┼─┐ │     interrupted, │   └─────────┬─────────┘
//!          └────────▲─────────┘ │ │     error, close │             │
//!                   │           │ └──────────────────┘             ▼
//!          ┌────────┴─────────┐ │ ┌──────────────────┐   ┌───────────────────┐
//!          │ Microphone       │ └▶│   Visualizer     │   │ Output mixer      │
//!          │ (audio::input)   │   │   (visualizer)   │   │ (audio::output)   │
//!          └──────────────────┘   └──────────────────┘   └───────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod profiles;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod visualizer;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default microphone sample rate
    pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = 16_000;

    /// Sample rate of synthesized audio returned by the service
    pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 24_000;

    /// Capture and playback are mono
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Samples per capture block, constant for the lifetime of a session
    pub const DEFAULT_BLOCK_SIZE: usize = 4096;

    /// Analyser window, in samples
    pub const DEFAULT_FFT_SIZE: usize = 2048;

    /// Visualizer redraw rate
    pub const DEFAULT_VISUALIZER_FPS: u32 = 30;

    /// Time allowed for the transport to signal open
    pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 15_000;

    /// Scale factor between float samples and PCM16
    pub const PCM16_SCALE: f32 = 32768.0;

    /// Model requested from the speech service
    pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

    /// Prebuilt synthetic voice used for every profile
    pub const DEFAULT_VOICE_NAME: &str = "Kore";

    /// Mime type prefix for outbound audio
    pub const PCM_MIME_TYPE: &str = "audio/pcm";
}
