//! Loopback transport
//!
//! Echoes every captured block straight back as synthesized audio, resampled
//! from the capture rate to the playback rate. Exercises the full
//! capture → transport → playback path without a network service.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::audio::frame::AudioFrame;
use crate::codec::pcm16_to_float;
use crate::constants::PCM_MIME_TYPE;
use crate::error::TransportError;
use crate::protocol::{AudioChunk, RealtimeInput, ServerMessage, TransportConfig};
use crate::session::event::{EventSender, TransportEvent};
use crate::transport::{Transport, TransportHandle};

/// Local echo "service"
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    playback_rate: u32,
}

impl LoopbackTransport {
    pub fn new(playback_rate: u32) -> Self {
        Self { playback_rate }
    }
}

impl Transport for LoopbackTransport {
    fn connect(
        &self,
        config: &TransportConfig,
        events: EventSender,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        tracing::info!(
            "Loopback session opened (model {}, voice {})",
            config.model,
            config.voice_name
        );
        tracing::debug!("System instruction: {}", config.system_instruction);

        events.transport(TransportEvent::Opened);
        Ok(Box::new(LoopbackHandle {
            events,
            playback_rate: self.playback_rate,
            open: true,
        }))
    }
}

struct LoopbackHandle {
    events: EventSender,
    playback_rate: u32,
    open: bool,
}

impl TransportHandle for LoopbackHandle {
    fn send(&mut self, input: RealtimeInput) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Send("session closed".to_string()));
        }

        let rate = mime_rate(&input.mime_type).ok_or_else(|| {
            TransportError::Send(format!("unsupported mime type {}", input.mime_type))
        })?;
        let frame = AudioFrame::from_transport_text(&input.data, rate, 1)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        let samples = pcm16_to_float(frame.data(), 1)
            .map_err(|e| TransportError::Send(e.to_string()))?
            .swap_remove(0);

        let echoed = resample(&samples, rate, self.playback_rate)?;
        let out = AudioFrame::from_samples(&echoed, self.playback_rate, 1);
        let chunk = AudioChunk {
            mime_type: format!("{};rate={}", PCM_MIME_TYPE, self.playback_rate),
            data: out.to_transport_text(),
            duration_hint: out.duration().ok(),
        };

        self.events
            .transport(TransportEvent::Message(ServerMessage::audio(chunk)));
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if !self.events.transport(TransportEvent::Closed) {
            return Err(TransportError::Close("session loop is gone".to_string()));
        }
        Ok(())
    }
}

/// `rate=` parameter of an `audio/pcm` mime type
fn mime_rate(mime_type: &str) -> Option<u32> {
    let mut parts = mime_type.split(';').map(str::trim);
    if parts.next()? != PCM_MIME_TYPE {
        return None;
    }
    parts
        .filter_map(|p| p.strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
}

/// Resample one block to `to` Hz, trimmed to exactly `len * to / from` frames
fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, TransportError> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let out_len = (samples.len() as u64 * u64::from(to) / u64::from(from)) as usize;
    let mut resampler = FastFixedIn::<f32>::new(
        f64::from(to) / f64::from(from),
        1.0,
        PolynomialDegree::Cubic,
        samples.len(),
        1,
    )
    .map_err(|e| TransportError::Send(format!("resampler init failed: {}", e)))?;
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| TransportError::Send(format!("resample failed: {}", e)))?
        .swap_remove(0);
    // Flush the tail still held back by the interpolator
    while output.len() < delay + out_len {
        let tail = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| TransportError::Send(format!("resample failed: {}", e)))?
            .swap_remove(0);
        if tail.is_empty() {
            break;
        }
        output.extend_from_slice(&tail);
    }

    let mut echoed: Vec<f32> = output.into_iter().skip(delay).take(out_len).collect();
    echoed.resize(out_len, 0.0);
    Ok(echoed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::event::SessionEvent;
    use tokio::sync::mpsc;

    #[test]
    fn test_mime_rate() {
        assert_eq!(mime_rate("audio/pcm;rate=16000"), Some(16_000));
        assert_eq!(mime_rate("audio/pcm; rate=24000"), Some(24_000));
        assert_eq!(mime_rate("audio/pcm"), None);
        assert_eq!(mime_rate("audio/opus;rate=48000"), None);
    }

    #[test]
    fn test_resample_lengths() {
        assert_eq!(resample(&[0.0; 160], 16_000, 24_000).unwrap().len(), 240);
        assert_eq!(resample(&[0.0; 240], 24_000, 16_000).unwrap().len(), 160);
        assert_eq!(resample(&[0.5, 0.5], 8_000, 8_000).unwrap(), vec![0.5, 0.5]);
        assert!(resample(&[], 16_000, 24_000).unwrap().is_empty());
    }

    #[test]
    fn test_resample_keeps_steady_level() {
        let out = resample(&[0.25; 4096], 16_000, 24_000).unwrap();
        assert_eq!(out.len(), 6144);
        let middle = &out[1000..5000];
        assert!(middle.iter().all(|&s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_echo_roundtrip() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = LoopbackTransport::new(24_000);
        let config = TransportConfig {
            model: "loopback".to_string(),
            response_modalities: vec![crate::protocol::Modality::Audio],
            voice_name: "Kore".to_string(),
            system_instruction: String::new(),
        };

        let mut handle = transport.connect(&config, EventSender::new(1, tx)).unwrap();
        assert_eq!(
            rx.try_recv().unwrap().event,
            SessionEvent::Transport(TransportEvent::Opened)
        );

        let block = AudioFrame::from_samples(&[0.25; 1600], 16_000, 1);
        handle
            .send(RealtimeInput {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: block.to_transport_text(),
            })
            .unwrap();

        match rx.try_recv().unwrap().event {
            SessionEvent::Transport(TransportEvent::Message(msg)) => {
                assert_eq!(msg.audio.len(), 1);
                let echoed =
                    AudioFrame::from_transport_text(&msg.audio[0].data, 24_000, 1).unwrap();
                assert!((echoed.duration().unwrap() - 0.1).abs() < 1e-9);
            }
            other => panic!("unexpected event {:?}", other),
        }

        handle.close().unwrap();
        handle.close().unwrap();
        assert_eq!(
            rx.try_recv().unwrap().event,
            SessionEvent::Transport(TransportEvent::Closed)
        );
        assert!(rx.try_recv().is_err());
        assert!(handle
            .send(RealtimeInput {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: String::new(),
            })
            .is_err());
    }

    #[test]
    fn test_close_after_loop_is_gone_fails() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = LoopbackTransport::new(24_000);
        let config = TransportConfig {
            model: "loopback".to_string(),
            response_modalities: vec![crate::protocol::Modality::Audio],
            voice_name: "Kore".to_string(),
            system_instruction: String::new(),
        };
        let mut handle = transport.connect(&config, EventSender::new(1, tx)).unwrap();
        drop(rx);

        assert!(matches!(handle.close(), Err(TransportError::Close(_))));
        assert!(handle.close().is_ok());
    }
}
