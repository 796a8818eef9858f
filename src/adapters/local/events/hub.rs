use super::MatchEvent;
use crate::config::DEFAULT_EVENT_CAPACITY;
use thiserror::Error;
use tokio::sync::broadcast;

/// Returned with the event when nobody is subscribed.
#[derive(Debug, Error)]
#[error("no listener for events of match {}", .0.game().id)]
pub struct NoListeners(pub MatchEvent);

/// Fan-out of match events to every subscribed listener.
///
/// Each subscriber buffers up to `capacity` events; a slower one skips the
/// oldest and sees `Lagged` on its next receive.
#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<MatchEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many listeners will see the event.
    pub fn publish(&self, event: MatchEvent) -> Result<usize, NoListeners> {
        let match_id = event.game().id;
        let trigger = event.trigger();
        let delivered = self
            .sender
            .send(event)
            .map_err(|broadcast::error::SendError(event)| NoListeners(event))?;
        tracing::debug!(match_id, ?trigger, listeners = delivered, "match event published");
        Ok(delivered)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.sender.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.sender.receiver_count()
    }
}
