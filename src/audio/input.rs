//! Microphone input on a dedicated thread
//!
//! The cpal stream is owned by its own thread for its whole life. Device
//! callbacks are rebatched into fixed-size mono blocks and posted into the
//! session loop; the callback never waits on the session.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{find_input_device, map_build_error, pick_stream_config, InputStream};
use crate::config::CaptureConfig;
use crate::error::{AudioError, DeviceError};
use crate::session::event::{EventSender, SessionEvent};

/// Turns arbitrarily sized interleaved device buffers into fixed-size mono blocks
#[derive(Debug)]
pub struct BlockAccumulator {
    block_size: usize,
    device_channels: usize,
    pending: Vec<f32>,
}

impl BlockAccumulator {
    pub fn new(block_size: usize, device_channels: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            device_channels: device_channels.max(1),
            pending: Vec::with_capacity(block_size * 2),
        }
    }

    /// Append interleaved samples; returns every block completed by them
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<Vec<f32>> {
        if self.device_channels == 1 {
            self.pending.extend_from_slice(interleaved);
        } else {
            let n = self.device_channels as f32;
            self.pending.extend(
                interleaved
                    .chunks_exact(self.device_channels)
                    .map(|frame| frame.iter().sum::<f32>() / n),
            );
        }

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            blocks.push(self.pending.drain(..self.block_size).collect());
        }
        blocks
    }

    /// Samples waiting for a full block
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Open microphone stream
pub struct CpalMicrophone {
    device_name: String,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalMicrophone {
    /// Open the configured input device and start posting blocks.
    ///
    /// Returns only after the stream is playing, so permission and device
    /// failures surface here rather than later on the session loop.
    pub fn open(config: &CaptureConfig, events: EventSender) -> Result<Self, DeviceError> {
        let device = find_input_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?
            .collect();
        let stream_config = pick_stream_config(&ranges, config.sample_rate, 1).ok_or_else(|| {
            DeviceError::Unavailable(format!(
                "{} cannot capture at {} Hz",
                device_name, config.sample_rate
            ))
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);
        let block_size = config.block_size;
        let device_channels = stream_config.channels;

        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let mut blocks = BlockAccumulator::new(block_size, device_channels as usize);
                let data_running = thread_running.clone();
                let data_events = events.clone();

                let stream = device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !data_running.load(Ordering::Relaxed) {
                            return;
                        }
                        for block in blocks.push(data) {
                            data_events.send(SessionEvent::CaptureBlock(block));
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
                        let _ = ready_tx.send(Err(map_build_error(e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream is dropped here, releasing the microphone
            })
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(DeviceError::Unavailable("capture thread exited".to_string())));
        if let Err(e) = ready {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!(
            "Microphone '{}' open at {} Hz ({} channels, {} samples/block)",
            device_name,
            config.sample_rate,
            device_channels,
            block_size
        );

        Ok(Self {
            device_name,
            running,
            thread_handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl InputStream for CpalMicrophone {
    fn stop_tracks(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::debug!("Microphone '{}' released", self.device_name);
        }
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.stop_tracks();
        Ok(())
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_fixed_size() {
        let mut acc = BlockAccumulator::new(4, 1);
        assert!(acc.push(&[0.1, 0.2, 0.3]).is_empty());
        assert_eq!(acc.pending(), 3);

        let blocks = acc.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(blocks, vec![vec![0.1, 0.2, 0.3, 0.4], vec![0.5, 0.6, 0.7, 0.8]]);
        assert_eq!(acc.pending(), 1);
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let mut acc = BlockAccumulator::new(2, 2);
        let blocks = acc.push(&[1.0, 0.0, 0.5, 0.5]);
        assert_eq!(blocks, vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn test_capture_open_on_default_device() {
        // Only meaningful on machines with a microphone
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let events = EventSender::new(1, tx);
        if let Ok(mut mic) = CpalMicrophone::open(&CaptureConfig::default(), events) {
            assert!(mic.is_running());
            mic.stop_tracks();
            assert!(!mic.is_running());
            // Second release is a no-op
            assert!(mic.close().is_ok());
        }
    }
}
