//! Capture pipeline
//!
//! Each microphone block is fed to the analyser tap, encoded as PCM16,
//! wrapped as realtime input and handed to the transport. Blocks that arrive
//! before the transport has opened are dropped: the audio graph is running
//! before the session is ready, so a short gap at startup is expected.

use crate::audio::analyser::AnalyserTap;
use crate::audio::frame::AudioFrame;
use crate::config::CaptureConfig;
use crate::protocol::RealtimeInput;
use crate::transport::TransportHandle;

/// What happened to one capture block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Sent,
    /// Transport not open yet
    Dropped,
    /// Transport refused the block
    SendFailed,
}

/// Capture counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub blocks_sent: u64,
    pub blocks_dropped: u64,
    pub send_failures: u64,
}

/// Per-session capture state
pub struct CapturePipeline {
    sample_rate: u32,
    block_size: usize,
    mime_type: String,
    analyser: AnalyserTap,
    forwarding: bool,
    stats: CaptureStats,
}

impl CapturePipeline {
    pub fn new(config: &CaptureConfig, fft_size: usize) -> Self {
        Self {
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            mime_type: config.mime_type(),
            analyser: AnalyserTap::new(fft_size),
            forwarding: false,
            stats: CaptureStats::default(),
        }
    }

    /// Start sending blocks; called once the transport signals open
    pub fn begin_forwarding(&mut self) {
        self.forwarding = true;
    }

    /// Handle one block from the microphone.
    ///
    /// Never waits on the transport: a failed send is counted and the block is lost.
    pub fn process_block(
        &mut self,
        block: &[f32],
        transport: Option<&mut (dyn TransportHandle + 'static)>,
    ) -> BlockOutcome {
        self.analyser.feed(block);

        if block.len() != self.block_size {
            tracing::trace!(
                "Capture block of {} samples, expected {}",
                block.len(),
                self.block_size
            );
        }

        let transport = match transport {
            Some(transport) if self.forwarding => transport,
            _ => {
                self.stats.blocks_dropped += 1;
                return BlockOutcome::Dropped;
            }
        };

        match transport.send(self.encode_block(block)) {
            Ok(()) => {
                self.stats.blocks_sent += 1;
                BlockOutcome::Sent
            }
            Err(e) => {
                self.stats.send_failures += 1;
                tracing::warn!("Failed to send capture block: {}", e);
                BlockOutcome::SendFailed
            }
        }
    }

    /// PCM16 + base64 wrapping of one block
    pub fn encode_block(&self, block: &[f32]) -> RealtimeInput {
        let frame = AudioFrame::from_samples(block, self.sample_rate, 1);
        RealtimeInput {
            mime_type: self.mime_type.clone(),
            data: frame.to_transport_text(),
        }
    }

    pub fn analyser(&self) -> &AnalyserTap {
        &self.analyser
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{pcm16_to_float, text_to_bytes};
    use crate::error::TransportError;

    #[derive(Default)]
    struct RecordingHandle {
        sent: Vec<RealtimeInput>,
        fail: bool,
    }

    impl TransportHandle for RecordingHandle {
        fn send(&mut self, input: RealtimeInput) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Send("socket closed".to_string()));
            }
            self.sent.push(input);
            Ok(())
        }

        fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn pipeline() -> CapturePipeline {
        CapturePipeline::new(&CaptureConfig::default(), 2048)
    }

    #[test]
    fn test_blocks_dropped_until_forwarding() {
        let mut capture = pipeline();
        let mut handle = RecordingHandle::default();
        let block = vec![0.25; 4096];

        assert_eq!(capture.process_block(&block, Some(&mut handle)), BlockOutcome::Dropped);
        assert_eq!(capture.process_block(&block, None), BlockOutcome::Dropped);
        assert!(handle.sent.is_empty());

        capture.begin_forwarding();
        assert_eq!(capture.process_block(&block, Some(&mut handle)), BlockOutcome::Sent);
        assert_eq!(handle.sent.len(), 1);
        assert_eq!(
            capture.stats(),
            CaptureStats {
                blocks_sent: 1,
                blocks_dropped: 2,
                send_failures: 0
            }
        );
    }

    #[test]
    fn test_encoded_block_layout() {
        let capture = pipeline();
        let input = capture.encode_block(&[0.5, -0.5]);
        assert_eq!(input.mime_type, "audio/pcm;rate=16000");

        let bytes = text_to_bytes(&input.data).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(pcm16_to_float(&bytes, 1).unwrap()[0], vec![0.5, -0.5]);
    }

    #[test]
    fn test_send_failure_does_not_stop_capture() {
        let mut capture = pipeline();
        capture.begin_forwarding();
        let mut handle = RecordingHandle {
            fail: true,
            ..Default::default()
        };

        assert_eq!(capture.process_block(&[0.0; 16], Some(&mut handle)), BlockOutcome::SendFailed);
        handle.fail = false;
        assert_eq!(capture.process_block(&[0.0; 16], Some(&mut handle)), BlockOutcome::Sent);
        assert_eq!(capture.stats().send_failures, 1);
    }

    #[test]
    fn test_analyser_tapped_even_when_dropping() {
        let mut capture = pipeline();
        capture.process_block(&[0.5; 4096], None);
        assert!(capture.analyser().byte_time_domain_data().iter().all(|&v| v == 192));
    }
}
