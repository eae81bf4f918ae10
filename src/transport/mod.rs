//! Transport seam to the remote speech service
//!
//! A transport opens one bidirectional session. Everything the service says
//! comes back as [`TransportEvent`](crate::session::event::TransportEvent)s
//! posted into the session loop; the handle is only used to send audio and
//! to close.

pub mod loopback;

use crate::error::TransportError;
use crate::protocol::{RealtimeInput, TransportConfig};
use crate::session::event::EventSender;

pub use loopback::LoopbackTransport;

/// One open session. Implementations must not block in `send`.
pub trait TransportHandle: Send {
    /// Queue one realtime input message
    fn send(&mut self, input: RealtimeInput) -> Result<(), TransportError>;

    /// Close the session. Closing twice must not fail.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Factory for sessions
pub trait Transport: Send {
    /// Begin opening a session. `Opened` is reported through `events`, not by
    /// returning: the handle exists before the session is ready.
    fn connect(
        &self,
        config: &TransportConfig,
        events: EventSender,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;
}
