//! Bridges the game's telemetry stream to the orchestrator, and the
//! orchestrator's instructions and notifications back out.

mod notifier;
mod outbox;

pub use notifier::Notifier;
pub use outbox::{ChannelPublisher, LogPublisher, Outbox, Publisher};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex};
use types::GameEvent;

use crate::{EngineError, Orchestrator};

enum Envelope {
    Event(GameEvent),
    Flush(oneshot::Sender<()>),
}

/// Routes each inbound event to the match it belongs to.
///
/// Every match gets its own actor task, so events for one match are
/// applied strictly in arrival order while a slow match never holds up
/// the others or the receive loop.
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    actors: DashMap<usize, mpsc::UnboundedSender<Envelope>>,
    active: Mutex<Option<usize>>,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            actors: DashMap::new(),
            active: Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn set_broadcasting(&self, enabled: bool) {
        self.orchestrator.set_broadcasting(enabled);
    }

    pub async fn active_match(&self) -> Option<usize> {
        *self.active.lock().await
    }

    /// Receives raw telemetry until the sending side goes away.
    pub async fn run(&self, mut inbound: mpsc::Receiver<String>) {
        while let Some(text) = inbound.recv().await {
            self.dispatch_text(&text).await;
        }
        log::info!("Telemetry stream closed");
        self.flush().await;
    }

    /// Decodes and routes one message. Anything undecodable is logged and
    /// dropped.
    pub async fn dispatch_text(&self, text: &str) -> Option<usize> {
        let event = match GameEvent::from_json(text) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Dropping telemetry: {e}");
                return None;
            }
        };
        match self.dispatch(event).await {
            Ok(index) => Some(index),
            Err(e) => {
                log::warn!("Dropping telemetry: {e}");
                None
            }
        }
    }

    /// Queues an event on its match and returns that match's index.
    pub async fn dispatch(&self, event: GameEvent) -> Result<usize, EngineError> {
        let index = self.route(&event).await?;
        let sender = self
            .actors
            .entry(index)
            .or_insert_with(|| self.spawn_actor(index))
            .value()
            .clone();
        if sender.send(Envelope::Event(event)).is_err() {
            log::error!("Actor for match {index} has stopped");
        }
        Ok(index)
    }

    /// Waits until every event queued so far has been applied.
    pub async fn flush(&self) {
        let indices: Vec<usize> = self.actors.iter().map(|entry| *entry.key()).collect();
        for index in indices {
            self.flush_match(index).await;
        }
    }

    /// A match start moves routing on to the next unfinished match, after
    /// the previous match has caught up. Everything else goes to the match
    /// routing currently points at.
    ///
    /// `active` stays locked across that catch-up, so a match start is a
    /// barrier: ingestion pauses until the previous match's queued events
    /// (its end included) are applied, and only then is the next match
    /// chosen. Ordinary events take the fast path above and never wait on
    /// an actor.
    async fn route(&self, event: &GameEvent) -> Result<usize, EngineError> {
        let mut active = self.active.lock().await;
        let starting = matches!(event, GameEvent::MatchStart);
        if let (Some(index), false) = (*active, starting) {
            return Ok(index);
        }
        if let Some(previous) = *active {
            self.flush_match(previous).await;
        }

        let target = if starting {
            self.orchestrator.next_match().await?
        } else {
            match self.orchestrator.current_match().await? {
                Some(m) => Some(m),
                None => self.orchestrator.next_match().await?,
            }
        };
        let index = target.map(|m| m.index).ok_or(EngineError::NoMatchAvailable)?;
        if *active != Some(index) {
            log::info!("Routing telemetry to match {index}");
        }
        *active = Some(index);
        Ok(index)
    }

    async fn flush_match(&self, index: usize) {
        let Some(sender) = self.actors.get(&index).map(|entry| entry.value().clone()) else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if sender.send(Envelope::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn spawn_actor(&self, index: usize) -> mpsc::UnboundedSender<Envelope> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                match envelope {
                    Envelope::Event(event) => {
                        let name = event.name();
                        if let Err(e) = orchestrator.handle_event(index, event).await {
                            log::warn!("Failed to apply {name} to match {index}: {e}");
                        }
                    }
                    Envelope::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        log::debug!("Spawned actor for match {index}");
        sender
    }
}
