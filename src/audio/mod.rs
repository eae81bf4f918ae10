//! Audio subsystem module

pub mod analyser;
pub mod capture;
pub mod device;
pub mod frame;
pub mod input;
pub mod output;
pub mod playback;

pub use analyser::AnalyserTap;
pub use capture::{BlockOutcome, CapturePipeline, CaptureStats};
pub use device::{list_devices, AudioBackend, AudioDeviceInfo, CpalBackend, InputStream, OutputSink};
pub use frame::{AudioFrame, DecodedAudio};
pub use playback::{PlaybackQueue, PlaybackScheduler, ScheduledSource, SourceId};
