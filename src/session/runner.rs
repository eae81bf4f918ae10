//! Session loop
//!
//! A single tokio task owns the [`SessionController`] and serializes every
//! input to it: caller commands, device and transport events, visualizer
//! ticks and the open deadline. Callers talk to it through a [`SessionClient`].

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::session::controller::{SessionController, SessionSnapshot};
use crate::session::event::EventReceiver;

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Requests from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    SelectVoice(String),
    /// Stop the session and end the loop
    Shutdown,
}

pub struct SessionRunner {
    controller: SessionController,
    events: EventReceiver,
    commands: mpsc::Receiver<SessionCommand>,
    frame_interval: Duration,
}

impl SessionRunner {
    pub fn new(controller: SessionController, events: EventReceiver) -> (Self, SessionClient) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let client = SessionClient {
            commands: tx,
            snapshot: controller.subscribe(),
        };
        let frame_interval = controller.config().visualizer.frame_interval();

        let runner = Self {
            controller,
            events,
            commands,
            frame_interval,
        };
        (runner, client)
    }

    /// Run until shutdown or until every client is dropped. Returns the
    /// controller, stopped.
    pub async fn run(mut self) -> SessionController {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.controller.open_deadline();

            tokio::select! {
                Some(envelope) = self.events.recv() => {
                    self.controller.handle_event(envelope);
                }
                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Start) => {
                            if let Err(e) = self.controller.start() {
                                tracing::warn!("Session did not start: {}", e);
                            }
                        }
                        Some(SessionCommand::Stop) => self.controller.stop(),
                        Some(SessionCommand::SelectVoice(id)) => {
                            if let Err(e) = self.controller.select_voice_by_id(&id) {
                                tracing::warn!("Voice change failed: {}", e);
                            }
                        }
                        Some(SessionCommand::Shutdown) | None => break,
                    }
                }
                _ = ticker.tick(), if self.controller.is_active() => {
                    self.controller.on_animation_frame();
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.controller.check_open_timeout(Instant::now());
                }
            }
        }

        self.controller.stop();
        tracing::info!("Session loop finished");
        self.controller
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running session loop
#[derive(Clone)]
pub struct SessionClient {
    commands: mpsc::Sender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionClient {
    pub async fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(SessionCommand::Stop).await
    }

    pub async fn select_voice(&self, id: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::SelectVoice(id.into())).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| Error::LoopClosed)
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next published change
    pub async fn changed(&mut self) -> Result<SessionSnapshot> {
        self.snapshot.changed().await.map_err(|_| Error::LoopClosed)?;
        Ok(self.snapshot.borrow_and_update().clone())
    }

    /// Wait until the published state satisfies `f`
    pub async fn wait_for(
        &mut self,
        f: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot> {
        let snapshot = self.snapshot.wait_for(f).await.map_err(|_| Error::LoopClosed)?;
        Ok(snapshot.clone())
    }
}
