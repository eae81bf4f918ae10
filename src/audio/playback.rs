//! Playback scheduler
//!
//! Chunks from the service arrive faster or slower than real time. Each one
//! is placed at `max(next_start_time, now)` on the output clock and the cursor
//! advances by its duration, so consecutive chunks play back to back with no
//! overlap, and a late chunk never schedules into the past.

use std::collections::BTreeMap;

use crate::audio::device::OutputSink;
use crate::audio::frame::AudioFrame;
use crate::config::PlaybackConfig;
use crate::error::Result;

/// Identifies one scheduled source on the output sink
pub type SourceId = u64;

/// A chunk placed on the output timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    /// Output clock time the source starts at, in seconds
    pub start_time: f64,
    pub duration: f64,
}

impl ScheduledSource {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Sources currently scheduled or playing, plus the scheduling cursor
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    sources: BTreeMap<SourceId, ScheduledSource>,
    next_start_time: f64,
}

impl PlaybackQueue {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Cursor on the output clock; 0 means "schedule against live time"
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }
}

/// Places decoded chunks on the output timeline
pub struct PlaybackScheduler {
    sample_rate: u32,
    channels: u16,
    queue: PlaybackQueue,
    next_id: SourceId,
}

impl PlaybackScheduler {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            queue: PlaybackQueue::default(),
            next_id: 1,
        }
    }

    /// Build a frame in the playback format from transport text
    pub fn frame_from_text(&self, text: &str) -> Result<AudioFrame> {
        Ok(AudioFrame::from_transport_text(text, self.sample_rate, self.channels)?)
    }

    /// Schedule one chunk right after everything already queued.
    ///
    /// A chunk that fails to decode is rejected without moving the cursor.
    pub fn schedule_playback(
        &mut self,
        chunk: &AudioFrame,
        output_clock_now: f64,
        sink: &mut dyn OutputSink,
    ) -> Result<ScheduledSource> {
        let audio = chunk.decode()?;
        let duration = audio.duration();
        let start_time = self.queue.next_start_time.max(output_clock_now);

        let id = self.next_id;
        self.next_id += 1;

        sink.start(id, audio, start_time)?;

        let source = ScheduledSource {
            id,
            start_time,
            duration,
        };
        self.queue.next_start_time = source.end_time();
        self.queue.sources.insert(id, source);

        tracing::trace!(
            "Scheduled source {} at {:.3}s for {:.3}s ({} queued)",
            id,
            start_time,
            duration,
            self.queue.len()
        );
        Ok(source)
    }

    /// The sink finished a source on its own
    pub fn on_source_ended(&mut self, id: SourceId) -> bool {
        self.queue.sources.remove(&id).is_some()
    }

    /// Discard all unplayed audio now. Returns how many sources were stopped.
    pub fn handle_interruption(&mut self, sink: &mut dyn OutputSink) -> usize {
        let stopped = self.queue.len();
        for id in self.queue.sources.keys() {
            sink.stop(*id);
        }
        self.forget_all();
        stopped
    }

    /// Clear queue and cursor without touching a sink (the sink is already gone)
    pub fn forget_all(&mut self) {
        self.queue.sources.clear();
        self.queue.next_start_time = 0.0;
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }
}
