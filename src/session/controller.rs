//! Session controller
//!
//! Owns every resource of the single streaming session: microphone, capture
//! pipeline, transport handle, output sink, playback queue and visualizer.
//! Nothing else holds references to them. All inputs arrive either as caller
//! commands or as [`Envelope`]s on the session loop.
//!
//! ```text
//!            start()                 Opened
//!   Idle ───────────────▶ Starting ───────────▶ Active
//!    ▲                       │                    │
//!    │                       │ device / open      │ stop(), transport error,
//!    │                       │ error, timeout     │ voice change
//!    │                       ▼                    ▼
//!    └──────────────────── Stopping ◀─────────────┘
//! ```

use std::fmt;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::audio::capture::{CapturePipeline, CaptureStats};
use crate::audio::device::{AudioBackend, InputStream, OutputSink};
use crate::audio::playback::{PlaybackQueue, PlaybackScheduler};
use crate::config::AppConfig;
use crate::error::{Error, Result, TransportError};
use crate::profiles::VoiceProfile;
use crate::protocol::{ServerMessage, TransportConfig};
use crate::session::event::{Envelope, EventReceiver, EventSender, SessionEvent, TransportEvent};
use crate::transport::{Transport, TransportHandle};
use crate::visualizer::{DisplaySurface, Visualizer};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Caller-observable session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_active: bool,
    pub is_initializing: bool,
    pub error: Option<String>,
    pub selected_voice: VoiceProfile,
    pub session_id: Option<Uuid>,
}

pub struct SessionController {
    config: AppConfig,
    transport: Box<dyn Transport>,
    backend: Box<dyn AudioBackend>,
    events_tx: mpsc::UnboundedSender<Envelope>,
    /// Incremented whenever a session is created or torn down
    epoch: u64,

    state: SessionState,
    error: Option<String>,
    selected_voice: VoiceProfile,
    session_id: Option<Uuid>,
    open_deadline: Option<Instant>,

    microphone: Option<Box<dyn InputStream>>,
    capture: Option<CapturePipeline>,
    output: Option<Box<dyn OutputSink>>,
    handle: Option<Box<dyn TransportHandle>>,
    scheduler: PlaybackScheduler,
    visualizer: Visualizer,

    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Create an idle controller and the receiving end of its event loop
    pub fn new(
        config: AppConfig,
        transport: Box<dyn Transport>,
        backend: Box<dyn AudioBackend>,
        surface: Option<Box<dyn DisplaySurface>>,
    ) -> Result<(Self, EventReceiver)> {
        config.validate()?;
        let selected_voice = config
            .initial_voice()
            .cloned()
            .ok_or_else(|| Error::Config("no voice profiles configured".to_string()))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let scheduler = PlaybackScheduler::new(&config.playback);
        let surface = if config.visualizer.enabled { surface } else { None };

        let snapshot = SessionSnapshot {
            state: SessionState::Idle,
            is_active: false,
            is_initializing: false,
            error: None,
            selected_voice: selected_voice.clone(),
            session_id: None,
        };
        let (snapshot_tx, _) = watch::channel(snapshot);

        let controller = Self {
            config,
            transport,
            backend,
            events_tx,
            epoch: 0,
            state: SessionState::Idle,
            error: None,
            selected_voice,
            session_id: None,
            open_deadline: None,
            microphone: None,
            capture: None,
            output: None,
            handle: None,
            scheduler,
            visualizer: Visualizer::new(surface),
            snapshot_tx,
        };
        Ok((controller, events_rx))
    }

    /// Start a session with the selected voice.
    ///
    /// Any existing session is torn down first, so at most one set of
    /// devices and one transport exist at a time. Returns once the transport
    /// is connecting; the session becomes active when it reports open.
    pub fn start(&mut self) -> Result<()> {
        self.teardown(false);

        self.epoch += 1;
        let events = EventSender::new(self.epoch, self.events_tx.clone());
        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.state = SessionState::Starting;
        self.error = None;
        self.publish();

        tracing::info!(
            "Starting session {} with voice '{}'",
            session_id,
            self.selected_voice.name
        );

        if let Err(e) = self.open_resources(events) {
            tracing::error!("Failed to start session {}: {}", session_id, e);
            self.error = Some(e.to_string());
            self.teardown(true);
            return Err(e);
        }

        self.open_deadline = self
            .config
            .session
            .open_timeout()
            .map(|timeout| Instant::now() + timeout);
        Ok(())
    }

    fn open_resources(&mut self, events: EventSender) -> Result<()> {
        let microphone = self
            .backend
            .open_microphone(&self.config.capture, events.clone())?;
        self.microphone = Some(microphone);
        self.capture = Some(CapturePipeline::new(
            &self.config.capture,
            self.config.visualizer.fft_size,
        ));

        let output = self.backend.open_output(&self.config.playback, events.clone())?;
        self.output = Some(output);

        let transport_config =
            TransportConfig::for_profile(&self.config.session, &self.selected_voice);
        let handle = self
            .transport
            .connect(&transport_config, events)
            .map_err(|e| match e {
                TransportError::Open(_) => e,
                other => TransportError::Open(other.to_string()),
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the session and clear any error. Safe to call in any state.
    pub fn stop(&mut self) {
        self.teardown(false);
    }

    /// Release everything. Each step is a no-op on an already released
    /// resource, and failures are logged rather than returned.
    fn teardown(&mut self, keep_error: bool) {
        let had_session = self.state != SessionState::Idle || self.has_resources();
        if had_session {
            self.state = SessionState::Stopping;
            self.publish();
        }

        self.visualizer.cancel();

        let mut microphone = self.microphone.take();
        if let Some(microphone) = microphone.as_mut() {
            microphone.stop_tracks();
        }
        self.capture = None;

        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.close() {
                tracing::warn!("Failed to close session transport: {}", e);
            }
        }

        match self.output.as_deref_mut() {
            Some(output) => {
                let stopped = self.scheduler.handle_interruption(output);
                if stopped > 0 {
                    tracing::debug!("Stopped {} queued playback sources", stopped);
                }
            }
            None => self.scheduler.forget_all(),
        }

        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.close() {
                tracing::warn!("Failed to close output device: {}", e);
            }
        }
        if let Some(mut microphone) = microphone {
            if let Err(e) = microphone.close() {
                tracing::warn!("Failed to close input device: {}", e);
            }
        }

        self.scheduler.forget_all();
        self.open_deadline = None;
        self.epoch += 1;

        if let Some(id) = self.session_id.take() {
            tracing::info!("Session {} stopped", id);
        }
        self.state = SessionState::Idle;
        if !keep_error {
            self.error = None;
        }
        self.publish();
    }

    fn has_resources(&self) -> bool {
        self.microphone.is_some()
            || self.capture.is_some()
            || self.output.is_some()
            || self.handle.is_some()
    }

    /// Change the voice. A live session restarts with the new profile baked in.
    pub fn select_voice(&mut self, profile: VoiceProfile) -> Result<()> {
        if profile.id == self.selected_voice.id {
            return Ok(());
        }

        let live = matches!(self.state, SessionState::Starting | SessionState::Active);
        if live {
            self.stop();
        }

        tracing::info!("Voice changed to '{}'", profile.name);
        self.selected_voice = profile;

        if live {
            self.start()
        } else {
            self.publish();
            Ok(())
        }
    }

    /// Select a voice from the configured catalog
    pub fn select_voice_by_id(&mut self, id: &str) -> Result<()> {
        let profile = self
            .config
            .voices
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| Error::Config(format!("unknown voice '{}'", id)))?;
        self.select_voice(profile)
    }

    /// Apply one event from the session loop
    pub fn handle_event(&mut self, envelope: Envelope) {
        if envelope.epoch != self.epoch {
            tracing::trace!("Ignoring event from stale session epoch {}", envelope.epoch);
            return;
        }

        match envelope.event {
            SessionEvent::Transport(TransportEvent::Opened) => self.on_open(),
            SessionEvent::Transport(TransportEvent::Message(message)) => self.on_message(message),
            SessionEvent::Transport(TransportEvent::Error(message)) => {
                self.on_transport_error(message)
            }
            SessionEvent::Transport(TransportEvent::Closed) => {
                // stop() may already be in flight; closing here would recurse
                tracing::info!("Session closed by peer");
            }
            SessionEvent::CaptureBlock(block) => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.process_block(&block, self.handle.as_deref_mut());
                }
            }
            SessionEvent::SourceEnded(id) => {
                self.scheduler.on_source_ended(id);
            }
            SessionEvent::DeviceFault(message) => {
                tracing::warn!("Audio device error: {}", message);
            }
        }
    }

    fn on_open(&mut self) {
        if self.state != SessionState::Starting {
            tracing::debug!("Open signal while {}, ignoring", self.state);
            return;
        }

        self.state = SessionState::Active;
        self.open_deadline = None;
        if let Some(capture) = self.capture.as_mut() {
            capture.begin_forwarding();
        }
        self.visualizer.schedule();
        self.publish();

        tracing::info!("Session open, streaming audio");
    }

    fn on_message(&mut self, message: ServerMessage) {
        let Some(output) = self.output.as_deref_mut() else {
            return;
        };

        for chunk in &message.audio {
            let frame = match self.scheduler.frame_from_text(&chunk.data) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Dropping undecodable audio chunk: {}", e);
                    continue;
                }
            };
            let now = output.current_time();
            if let Err(e) = self.scheduler.schedule_playback(&frame, now, output) {
                tracing::warn!("Dropping audio chunk: {}", e);
            }
        }

        if message.interrupted {
            let stopped = self.scheduler.handle_interruption(output);
            tracing::debug!("Interrupted, discarded {} queued sources", stopped);
        }
    }

    fn on_transport_error(&mut self, message: String) {
        if self.state == SessionState::Idle {
            return;
        }

        let message = if message.is_empty() {
            "An unknown error occurred".to_string()
        } else {
            message
        };
        tracing::error!("Session error: {}", message);
        self.error = Some(TransportError::Runtime(message).to_string());
        self.teardown(true);
    }

    /// One visualizer tick
    pub fn on_animation_frame(&mut self) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.visualizer
            .on_frame(self.capture.as_ref().map(|c| c.analyser()))
    }

    /// When the pending open gives up, if a timeout is configured
    pub fn open_deadline(&self) -> Option<Instant> {
        self.open_deadline
    }

    /// Abandon a session that has not opened by its deadline
    pub fn check_open_timeout(&mut self, now: Instant) -> bool {
        let expired = self.state == SessionState::Starting
            && self.open_deadline.is_some_and(|deadline| now >= deadline);
        if !expired {
            return false;
        }

        let err = TransportError::Open("timed out waiting for the session to open".to_string());
        tracing::error!("{}", err);
        self.error = Some(err.to_string());
        self.teardown(true);
        true
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_initializing(&self) -> bool {
        self.state == SessionState::Starting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected_voice(&self) -> &VoiceProfile {
        &self.selected_voice
    }

    pub fn voices(&self) -> &[VoiceProfile] {
        &self.config.voices
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn playback_queue(&self) -> &PlaybackQueue {
        self.scheduler.queue()
    }

    pub fn capture_stats(&self) -> Option<CaptureStats> {
        self.capture.as_ref().map(CapturePipeline::stats)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            is_active: self.is_active(),
            is_initializing: self.is_initializing(),
            error: self.error.clone(),
            selected_voice: self.selected_voice.clone(),
            session_id: self.session_id,
        }
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.has_resources() {
            self.teardown(true);
        }
    }
}
