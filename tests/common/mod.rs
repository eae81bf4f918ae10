//! Test doubles for the session's device and transport seams

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use voice_morph::audio::{AudioBackend, DecodedAudio, InputStream, OutputSink, SourceId};
use voice_morph::config::{AppConfig, CaptureConfig, PlaybackConfig};
use voice_morph::error::{AudioError, DeviceError, TransportError};
use voice_morph::protocol::{RealtimeInput, TransportConfig};
use voice_morph::session::{
    Envelope, EventReceiver, EventSender, SessionController, SessionEvent, SessionSnapshot,
    SessionState, TransportEvent,
};
use voice_morph::transport::{Transport, TransportHandle};

/// Everything the mock transport has seen
#[derive(Default)]
pub struct TransportLog {
    pub connects: Vec<TransportConfig>,
    pub sent: Vec<RealtimeInput>,
    pub closes: usize,
    /// Event sender of the most recent connect
    pub events: Option<EventSender>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    pub log: Arc<Mutex<TransportLog>>,
    /// Report open from inside connect
    pub open_immediately: bool,
    pub fail_connect: Option<TransportError>,
    /// Report a failure from every close
    pub fail_close: bool,
}

impl MockTransport {
    pub fn opening() -> Self {
        Self {
            open_immediately: true,
            ..Default::default()
        }
    }

    /// Post an event as the most recently connected session
    pub fn inject(&self, event: TransportEvent) {
        let log = self.log.lock();
        if let Some(events) = log.events.as_ref() {
            events.transport(event);
        }
    }

    pub fn last_events(&self) -> Option<EventSender> {
        self.log.lock().events.clone()
    }

    pub fn sent(&self) -> Vec<RealtimeInput> {
        self.log.lock().sent.clone()
    }
}

impl Transport for MockTransport {
    fn connect(
        &self,
        config: &TransportConfig,
        events: EventSender,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        if let Some(err) = self.fail_connect.clone() {
            return Err(err);
        }

        let mut log = self.log.lock();
        log.connects.push(config.clone());
        log.events = Some(events.clone());
        if self.open_immediately {
            events.transport(TransportEvent::Opened);
        }

        Ok(Box::new(MockHandle {
            log: self.log.clone(),
            events,
            closed: false,
            fail_close: self.fail_close,
        }))
    }
}

struct MockHandle {
    log: Arc<Mutex<TransportLog>>,
    events: EventSender,
    closed: bool,
    fail_close: bool,
}

impl TransportHandle for MockHandle {
    fn send(&mut self, input: RealtimeInput) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send("closed".to_string()));
        }
        self.log.lock().sent.push(input);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.log.lock().closes += 1;
            self.events.transport(TransportEvent::Closed);
            if self.fail_close {
                return Err(TransportError::Close("socket already reset".to_string()));
            }
        }
        Ok(())
    }
}

/// Everything the mock devices have seen
#[derive(Default)]
pub struct DeviceLog {
    pub mics_opened: usize,
    pub mics_closed: usize,
    pub outputs_opened: usize,
    pub outputs_closed: usize,
    /// Output clock in seconds
    pub clock: f64,
    /// (id, start time, frames)
    pub started: Vec<(SourceId, f64, usize)>,
    pub stopped: Vec<SourceId>,
    /// Event sender of the most recent microphone
    pub mic_events: Option<EventSender>,
    /// Published session state each time a microphone was requested
    pub states_at_mic_request: Vec<SessionState>,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub log: Arc<Mutex<DeviceLog>>,
    pub mic_error: Option<DeviceError>,
    observer: Arc<Mutex<Option<watch::Receiver<SessionSnapshot>>>>,
}

impl MockBackend {
    pub fn denying() -> Self {
        Self {
            mic_error: Some(DeviceError::PermissionDenied),
            ..Default::default()
        }
    }

    /// Watch published state from inside the device callbacks
    pub fn observe(&self, snapshots: watch::Receiver<SessionSnapshot>) {
        *self.observer.lock() = Some(snapshots);
    }

    pub fn set_clock(&self, seconds: f64) {
        self.log.lock().clock = seconds;
    }

    /// Deliver one capture block as the current microphone
    pub fn capture(&self, block: Vec<f32>) {
        let log = self.log.lock();
        if let Some(events) = log.mic_events.as_ref() {
            events.send(SessionEvent::CaptureBlock(block));
        }
    }

    pub fn started(&self) -> Vec<(SourceId, f64, usize)> {
        self.log.lock().started.clone()
    }
}

impl AudioBackend for MockBackend {
    fn open_microphone(
        &self,
        _config: &CaptureConfig,
        events: EventSender,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        if let Some(snapshots) = self.observer.lock().as_ref() {
            let state = snapshots.borrow().state;
            self.log.lock().states_at_mic_request.push(state);
        }
        if let Some(err) = self.mic_error.clone() {
            return Err(err);
        }
        let mut log = self.log.lock();
        log.mics_opened += 1;
        log.mic_events = Some(events);
        Ok(Box::new(MockMic {
            log: self.log.clone(),
            open: true,
        }))
    }

    fn open_output(
        &self,
        _config: &PlaybackConfig,
        _events: EventSender,
    ) -> Result<Box<dyn OutputSink>, AudioError> {
        self.log.lock().outputs_opened += 1;
        Ok(Box::new(MockSink {
            log: self.log.clone(),
            open: true,
        }))
    }
}

struct MockMic {
    log: Arc<Mutex<DeviceLog>>,
    open: bool,
}

impl InputStream for MockMic {
    fn stop_tracks(&mut self) {
        self.log.lock().mic_events = None;
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.open {
            self.open = false;
            self.log.lock().mics_closed += 1;
        }
        Ok(())
    }
}

struct MockSink {
    log: Arc<Mutex<DeviceLog>>,
    open: bool,
}

impl OutputSink for MockSink {
    fn current_time(&self) -> f64 {
        self.log.lock().clock
    }

    fn start(&mut self, id: SourceId, audio: DecodedAudio, at: f64) -> Result<(), AudioError> {
        if !self.open {
            return Err(AudioError::StreamError("closed".to_string()));
        }
        self.log.lock().started.push((id, at, audio.frames()));
        Ok(())
    }

    fn stop(&mut self, id: SourceId) {
        self.log.lock().stopped.push(id);
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.open {
            self.open = false;
            self.log.lock().outputs_closed += 1;
        }
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.visualizer.enabled = false;
    config
}

pub fn controller(
    config: AppConfig,
    transport: &MockTransport,
    backend: &MockBackend,
) -> (SessionController, EventReceiver) {
    SessionController::new(
        config,
        Box::new(transport.clone()),
        Box::new(backend.clone()),
        None,
    )
    .unwrap()
}

/// Deliver every queued event to the controller
pub fn pump(
    controller: &mut SessionController,
    events: &mut mpsc::UnboundedReceiver<Envelope>,
) -> usize {
    let mut delivered = 0;
    while let Ok(envelope) = events.try_recv() {
        controller.handle_event(envelope);
        delivered += 1;
    }
    delivered
}
