//! Speaker output: a software mixer with its own sample clock
//!
//! Sources are placed on an absolute frame timeline. The device callback
//! renders whatever overlaps the current buffer, advances the clock, and
//! reports sources that have played to the end.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{find_output_device, pick_stream_config, OutputSink};
use crate::audio::frame::DecodedAudio;
use crate::audio::playback::SourceId;
use crate::config::PlaybackConfig;
use crate::error::AudioError;
use crate::session::event::{EventSender, SessionEvent};

struct Voice {
    id: SourceId,
    samples: Vec<f32>,
    start_frame: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

#[derive(Default)]
struct MixerState {
    /// Frames rendered since the mixer was created
    clock: u64,
    voices: Vec<Voice>,
}

/// Mono source mixer on an absolute frame timeline
pub struct Mixer {
    sample_rate: u32,
    state: Mutex<MixerState>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Mutex::new(MixerState::default()),
        }
    }

    /// Seconds rendered so far
    pub fn current_time(&self) -> f64 {
        self.state.lock().clock as f64 / f64::from(self.sample_rate)
    }

    /// Place a source at time `at`. The source keeps its place on the
    /// timeline: whatever part of it is already in the past is skipped, so it
    /// still ends on its scheduled frame.
    pub fn schedule(&self, id: SourceId, samples: Vec<f32>, at: f64) {
        let mut state = self.state.lock();
        let start_frame = (at * f64::from(self.sample_rate)).round().max(0.0) as u64;
        if start_frame < state.clock {
            tracing::trace!(
                "Source {} is {} frames late, skipping its head",
                id,
                state.clock - start_frame
            );
        }
        state.voices.push(Voice {
            id,
            samples,
            start_frame,
        });
    }

    /// Drop a source without reporting it as ended
    pub fn remove(&self, id: SourceId) -> bool {
        let mut state = self.state.lock();
        let before = state.voices.len();
        state.voices.retain(|v| v.id != id);
        state.voices.len() != before
    }

    pub fn clear(&self) {
        self.state.lock().voices.clear();
    }

    pub fn active_sources(&self) -> usize {
        self.state.lock().voices.len()
    }

    /// Fill an interleaved buffer, advance the clock and return the ids of
    /// sources that finished inside it
    pub fn render(&self, out: &mut [f32], channels: usize) -> Vec<SourceId> {
        let channels = channels.max(1);
        let frames = (out.len() / channels) as u64;
        out.fill(0.0);

        let mut state = self.state.lock();
        let base = state.clock;
        let end = base + frames;

        for voice in &state.voices {
            let from = voice.start_frame.max(base);
            let to = voice.end_frame().min(end);
            for t in from..to {
                let sample = voice.samples[(t - voice.start_frame) as usize];
                let offset = (t - base) as usize * channels;
                for out_sample in &mut out[offset..offset + channels] {
                    *out_sample += sample;
                }
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        state.clock = end;
        let mut ended = Vec::new();
        state.voices.retain(|v| {
            let done = v.end_frame() <= end;
            if done {
                ended.push(v.id);
            }
            !done
        });
        ended
    }
}

/// Open speaker stream
pub struct CpalOutput {
    mixer: Arc<Mixer>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalOutput {
    pub fn open(config: &PlaybackConfig, events: EventSender) -> Result<Self, AudioError> {
        let device = find_output_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
            .collect();
        let stream_config = pick_stream_config(&ranges, config.sample_rate, config.channels)
            .ok_or_else(|| {
                AudioError::UnsupportedFormat(format!(
                    "{} cannot play at {} Hz",
                    device_name, config.sample_rate
                ))
            })?;
        let device_channels = stream_config.channels as usize;

        let mixer = Arc::new(Mixer::new(config.sample_rate));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_mixer = mixer.clone();
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                let data_events = events.clone();
                let stream = device.build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for id in thread_mixer.render(data, device_channels) {
                            data_events.send(SessionEvent::SourceEnded(id));
                        }
                    },
                    move |err| {
                        events.send(SessionEvent::DeviceFault(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::StreamError("playback thread exited".to_string())));
        if let Err(e) = ready {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!(
            "Speaker '{}' open at {} Hz ({} channels)",
            device_name,
            config.sample_rate,
            device_channels
        );

        Ok(Self {
            mixer,
            running,
            thread_handle: Some(handle),
        })
    }
}

impl OutputSink for CpalOutput {
    fn current_time(&self) -> f64 {
        self.mixer.current_time()
    }

    fn start(&mut self, id: SourceId, audio: DecodedAudio, at: f64) -> Result<(), AudioError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::StreamError("output is closed".to_string()));
        }
        self.mixer.schedule(id, audio.to_mono(), at);
        Ok(())
    }

    fn stop(&mut self, id: SourceId) {
        self.mixer.remove(id);
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        self.mixer.clear();

        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| AudioError::CloseFailed("playback thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
