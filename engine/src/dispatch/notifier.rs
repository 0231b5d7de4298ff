use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use types::{ChangeNotification, NotificationKind};

/// Fans change notifications out to every subscriber.
///
/// Sending never blocks and never fails the caller: with broadcasting
/// turned off, or nobody listening, the notification is simply dropped.
#[derive(Debug)]
pub struct Notifier {
    sender: broadcast::Sender<ChangeNotification>,
    enabled: AtomicBool,
}

impl Notifier {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.sender.subscribe()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        log::info!("Broadcasting {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn notify<T: Serialize>(&self, kind: NotificationKind, data: &T) {
        if !self.is_enabled() {
            return;
        }
        let notification = match ChangeNotification::new(kind, data) {
            Ok(n) => n,
            Err(e) => {
                log::error!("Failed to encode {kind:?} notification: {e}");
                return;
            }
        };
        if self.sender.send(notification).is_err() {
            log::debug!("No subscribers for {kind:?} notification");
        }
    }
}
