//! Channels between the feed, the order venue and the engine loop
//!
//! Market data flows through a bounded channel so a fast replay cannot run
//! ahead of the engine. Order notifications get their own unbounded channel
//! and are never dropped, whatever the state of the bar channel.

use tokio::sync::mpsc;

use super::events::EngineEvent;

/// Default bar channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Bar channel with the default buffer size
pub fn create_event_channel() -> (mpsc::Sender<EngineEvent>, mpsc::Receiver<EngineEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Bar channel with a configured buffer size (at least one slot)
pub fn create_event_channel_with_size(
    size: usize,
) -> (mpsc::Sender<EngineEvent>, mpsc::Receiver<EngineEvent>) {
    mpsc::channel(size.max(1))
}

/// Order status and fill notifications from the venue
pub fn create_notification_channel() -> (mpsc::UnboundedSender<EngineEvent>, mpsc::UnboundedReceiver<EngineEvent>) {
    mpsc::unbounded_channel()
}
