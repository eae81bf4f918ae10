//! Session lifecycle
//!
//! The controller is the state machine; the runner is the task that feeds it.

pub mod controller;
pub mod event;
pub mod runner;

pub use controller::{SessionController, SessionSnapshot, SessionState};
pub use event::{Envelope, EventReceiver, EventSender, SessionEvent, TransportEvent};
pub use runner::{SessionClient, SessionCommand, SessionRunner};
