//! Event System
//!
//! Preload progress and user-facing notices, published on a pub/sub bus.

use parking_lot::RwLock;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::orchestrator::PreloadState;

/// Pipeline stage reported while preloading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadStage {
    ResolvingPackage,
    ExtractingLibraries,
    InitializingSdk,
    LoadingLibrary(String),
    LoadingMods,
    LoadingBridge,
    FinishedNativeLibraries,
}

/// Events emitted by the preload subsystem
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Orchestrator state changed
    StateChanged(PreloadState),
    /// A pipeline attempt began (1-based)
    PreloadStarted { attempt: u32 },
    /// Pipeline progress
    Stage(PreloadStage),
    /// Transient failure; another attempt follows
    RetryScheduled { attempt: u32, max: u32 },
    /// Preload failed; `terminal` means no further attempts
    PreloadFailed { message: String, terminal: bool },
    /// Libraries are loaded and the game can start
    GameReady,
}

/// Subscriber handle for receiving events
#[derive(Clone)]
pub struct EventSubscription {
    receiver: Receiver<Event>,
}

impl EventSubscription {
    /// Receive the next event (blocking)
    pub fn recv(&self) -> Result<Event, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Receive the next event, waiting at most `timeout`
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<Event, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> Result<Event, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently queued
    pub fn drain(&self) -> Vec<Event> {
        self.receiver.try_iter().collect()
    }
}

/// Event bus for publish/subscribe pattern
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<Event>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        EventSubscription { receiver }
    }

    /// Emit an event to all subscribers, dropping those that went away
    pub fn emit(&self, event: Event) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        let delivered = subscribers.len();

        debug!("Event {:?} delivered to {} subscribers", event, delivered);
        delivered
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus() {
        let bus = EventBus::new();
        let sub1 = bus.subscribe();
        let sub2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus.emit(Event::Stage(PreloadStage::ExtractingLibraries));
        assert_eq!(delivered, 2);

        assert_eq!(sub1.try_recv().unwrap(), Event::Stage(PreloadStage::ExtractingLibraries));
        assert!(sub2.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_subscriber_not_counted() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        assert_eq!(bus.emit(Event::GameReady), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.drain(), vec![Event::GameReady]);
    }
}
