//! Time-domain analyser tap on the capture path
//!
//! Keeps the most recent `fft_size` samples without altering the audio that
//! flows on to the transport.

use std::collections::VecDeque;

/// Rolling window of the latest captured samples
#[derive(Debug, Clone)]
pub struct AnalyserTap {
    window: VecDeque<f32>,
    fft_size: usize,
}

impl AnalyserTap {
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(1);
        let mut window = VecDeque::with_capacity(fft_size);
        window.resize(fft_size, 0.0);
        Self { window, fft_size }
    }

    /// Append samples, discarding the oldest beyond the window
    pub fn feed(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.fft_size);
        for &sample in &samples[skip..] {
            if self.window.len() == self.fft_size {
                self.window.pop_front();
            }
            self.window.push_back(sample);
        }
    }

    /// Number of values returned by [`Self::byte_time_domain_data`]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Latest half window as unsigned bytes centered on 128
    pub fn byte_time_domain_data(&self) -> Vec<u8> {
        let start = self.window.len() - self.bin_count().min(self.window.len());
        self.window
            .iter()
            .skip(start)
            .map(|&s| (128.0 + s * 128.0).clamp(0.0, 255.0) as u8)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_centered() {
        let tap = AnalyserTap::new(8);
        assert_eq!(tap.byte_time_domain_data(), vec![128; 4]);
    }

    #[test]
    fn test_keeps_latest_samples() {
        let mut tap = AnalyserTap::new(4);
        tap.feed(&[0.0, 0.0, 0.0, 0.0, 0.5, -0.5]);
        assert_eq!(tap.byte_time_domain_data(), vec![192, 64]);
    }

    #[test]
    fn test_values_clamped() {
        let mut tap = AnalyserTap::new(2);
        tap.feed(&[5.0]);
        assert_eq!(tap.byte_time_domain_data(), vec![255]);
        tap.feed(&[-5.0]);
        assert_eq!(tap.byte_time_domain_data(), vec![0]);
    }
}
