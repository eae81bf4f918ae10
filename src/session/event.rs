//! Events delivered into the session loop
//!
//! Device callbacks and transport adapters never touch session state directly.
//! They post an [`Envelope`] stamped with the epoch of the session that created
//! them, and the controller drops envelopes from sessions that no longer exist.

use tokio::sync::mpsc;

use crate::audio::playback::SourceId;
use crate::protocol::ServerMessage;

/// Callbacks from the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Session is ready to accept audio
    Opened,
    /// Audio and/or interruption from the service
    Message(ServerMessage),
    /// Mid-session failure
    Error(String),
    /// Peer closed the connection
    Closed,
}

/// Any input to the session state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Transport(TransportEvent),
    /// One fixed-size block of mono capture samples
    CaptureBlock(Vec<f32>),
    /// A scheduled playback source finished on its own
    SourceEnded(SourceId),
    /// Non-fatal device stream error
    DeviceFault(String),
}

/// An event tagged with the session it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub epoch: u64,
    pub event: SessionEvent,
}

pub type EventReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Handle given to collaborators for posting events into one session
#[derive(Debug, Clone)]
pub struct EventSender {
    epoch: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Post an event. Never blocks; returns false once the loop is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx
            .send(Envelope {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }

    pub fn transport(&self, event: TransportEvent) -> bool {
        self.send(SessionEvent::Transport(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelopes_carry_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = EventSender::new(7, tx);

        assert!(sender.transport(TransportEvent::Opened));
        assert!(sender.send(SessionEvent::SourceEnded(3)));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.epoch, 7);
        assert_eq!(first.event, SessionEvent::Transport(TransportEvent::Opened));
        assert_eq!(rx.try_recv().unwrap().event, SessionEvent::SourceEnded(3));
    }

    #[test]
    fn test_send_after_loop_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = EventSender::new(1, tx);
        drop(rx);
        assert!(!sender.send(SessionEvent::CaptureBlock(vec![0.0])));
    }
}
