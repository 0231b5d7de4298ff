use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use types::GameMatchMessage;

use crate::PublishError;

/// Delivers the next-match instruction to the game.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: GameMatchMessage) -> Result<(), PublishError>;
}

/// Hands instructions to whoever holds the receiving end.
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<GameMatchMessage>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GameMatchMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, message: GameMatchMessage) -> Result<(), PublishError> {
        self.sender.send(message).map_err(|_| PublishError::Closed)
    }
}

/// Writes instructions to the log instead of a game.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, message: GameMatchMessage) -> Result<(), PublishError> {
        let nicks: Vec<&str> = message.players.iter().map(|p| p.top_name.as_str()).collect();
        log::info!(
            "Next up on {} ({}, {} kills): {}",
            message.level,
            message.kind,
            message.round_length,
            nicks.join(", ")
        );
        Ok(())
    }
}

/// Bounded queue in front of a [`Publisher`], drained by one worker task.
///
/// Submitting never waits on delivery. A full queue drops the instruction
/// and delivery failures are only logged.
pub struct Outbox {
    sender: mpsc::Sender<GameMatchMessage>,
    connected: Arc<AtomicBool>,
}

impl Outbox {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(publisher: Arc<dyn Publisher>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<GameMatchMessage>(capacity.max(1));
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let level = message.level.clone();
                if let Err(e) = publisher.publish(message).await {
                    log::error!("Failed to publish next match on {level}: {e}");
                }
            }
            log::debug!("Outbox worker stopped");
        });
        Self {
            sender,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        log::info!("Game {}", if connected { "connected" } else { "disconnected" });
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn submit(&self, message: GameMatchMessage) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::Disconnected);
        }
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                log::error!("Outbox full, dropping next match on {}", message.level);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(PublishError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::MatchKind;

    fn message(level: &str) -> GameMatchMessage {
        GameMatchMessage {
            tournament: "df".into(),
            level: level.into(),
            round_length: 10,
            ruleset: String::new(),
            kind: MatchKind::Qualifying,
            players: Vec::new(),
        }
    }

    #[tokio::test]
    async fn submitted_messages_reach_the_publisher() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let outbox = Outbox::spawn(Arc::new(publisher), 4);
        outbox.submit(message("twilight")).unwrap();
        outbox.submit(message("flight")).unwrap();
        assert_eq!(rx.recv().await.unwrap().level, "twilight");
        assert_eq!(rx.recv().await.unwrap().level, "flight");
    }

    #[tokio::test]
    async fn disconnected_outbox_refuses() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let outbox = Outbox::spawn(Arc::new(publisher), 4);
        outbox.set_connected(false);
        assert_eq!(outbox.submit(message("mirage")), Err(PublishError::Disconnected));

        outbox.set_connected(true);
        outbox.submit(message("mirage")).unwrap();
        assert_eq!(rx.recv().await.unwrap().level, "mirage");
    }

    #[tokio::test]
    async fn failing_publisher_does_not_stop_the_worker() {
        let (publisher, rx) = ChannelPublisher::new();
        drop(rx);
        let outbox = Outbox::spawn(Arc::new(publisher), 4);
        outbox.submit(message("backfire")).unwrap();
        outbox.submit(message("thornwood")).unwrap();
        assert!(outbox.is_connected());
    }
}
