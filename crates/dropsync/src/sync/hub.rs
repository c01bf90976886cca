//! Progress broadcast hub.
//!
//! Maps a shop to the set of live listeners interested in its sync events.
//! The hub is deliberately ignorant of whether a run is active: a caller
//! may open a live-updates channel before ever triggering a sync, and a
//! run publishes into the void when nobody is listening.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::types::SyncEvent;

/// Handle identifying one subscription, needed to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    tx: mpsc::UnboundedSender<SyncEvent>,
}

/// Per-shop registry of live event listeners.
///
/// Delivery is synchronous and in subscription order. A listener whose
/// receiving side is gone counts as faulted: the failure is logged,
/// delivery to the remaining listeners continues, and the dead entry is
/// pruned so one broken observer can never break the broadcast.
#[derive(Default)]
pub struct ProgressHub {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `shop`'s events.
    ///
    /// Returns the id to unsubscribe with and the receiving end of the
    /// event channel.
    pub fn subscribe(&self, shop: &str) -> (ListenerId, mpsc::UnboundedReceiver<SyncEvent>) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners
            .entry(shop.to_string())
            .or_default()
            .push(Listener { id, tx });

        (id, rx)
    }

    /// Remove a listener. Returns whether it was still registered.
    ///
    /// The shop's bookkeeping entry is discarded once its listener set
    /// becomes empty; publishing to a shop without listeners is a no-op,
    /// so the entry carries no state worth keeping.
    pub fn unsubscribe(&self, shop: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());

        let Some(entries) = listeners.get_mut(shop) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|listener| listener.id != id);
        let removed = entries.len() < before;

        if entries.is_empty() {
            listeners.remove(shop);
        }

        removed
    }

    /// Deliver an event to every listener currently subscribed for `shop`,
    /// in subscription order. Called only by the sync engine.
    pub(crate) fn publish(&self, shop: &str, event: &SyncEvent) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());

        let Some(entries) = listeners.get_mut(shop) else {
            return;
        };

        entries.retain(|listener| {
            if listener.tx.send(event.clone()).is_err() {
                tracing::debug!(shop, listener = listener.id.0, "dropping dead event listener");
                false
            } else {
                true
            }
        });

        if entries.is_empty() {
            listeners.remove(shop);
        }
    }

    /// Number of live listeners for `shop`.
    pub fn listener_count(&self, shop: &str) -> usize {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.get(shop).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::SyncEventKind;

    #[test]
    fn publish_without_listeners_is_a_noop() {
        let hub = ProgressHub::new();
        hub.publish("shop.example", &SyncEvent::progress("shop.example", 1));
        assert_eq!(hub.listener_count("shop.example"), 0);
    }

    #[tokio::test]
    async fn delivers_to_all_listeners_in_subscription_order() {
        let hub = ProgressHub::new();
        let (_first_id, mut first) = hub.subscribe("shop.example");
        let (_second_id, mut second) = hub.subscribe("shop.example");

        hub.publish("shop.example", &SyncEvent::started("shop.example", 0));
        hub.publish("shop.example", &SyncEvent::progress("shop.example", 2));

        for rx in [&mut first, &mut second] {
            let a = rx.recv().await.expect("first event");
            let b = rx.recv().await.expect("second event");
            assert_eq!(a.kind, SyncEventKind::Started);
            assert_eq!(b.kind, SyncEventKind::Progress);
            assert_eq!(b.synced_so_far, 2);
        }
    }

    #[tokio::test]
    async fn dead_listener_does_not_block_the_rest() {
        let hub = ProgressHub::new();
        let (_dead_id, dead_rx) = hub.subscribe("shop.example");
        let (_live_id, mut live_rx) = hub.subscribe("shop.example");

        drop(dead_rx);
        hub.publish("shop.example", &SyncEvent::progress("shop.example", 3));

        let event = live_rx.recv().await.expect("live listener still served");
        assert_eq!(event.synced_so_far, 3);
        // The dead listener was pruned during delivery.
        assert_eq!(hub.listener_count("shop.example"), 1);
    }

    #[test]
    fn listeners_are_scoped_per_shop() {
        let hub = ProgressHub::new();
        let (_id, mut other_rx) = hub.subscribe("other-shop.example");

        hub.publish("shop.example", &SyncEvent::progress("shop.example", 1));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_removes_listener_and_cleans_up_entry() {
        let hub = ProgressHub::new();
        let (id, _rx) = hub.subscribe("shop.example");
        assert_eq!(hub.listener_count("shop.example"), 1);

        assert!(hub.unsubscribe("shop.example", id));
        assert_eq!(hub.listener_count("shop.example"), 0);

        // Second unsubscribe is a benign no-op.
        assert!(!hub.unsubscribe("shop.example", id));
    }

    #[tokio::test]
    async fn subscription_before_any_run_receives_nothing_until_published() {
        let hub = ProgressHub::new();
        let (_id, mut rx) = hub.subscribe("shop.example");

        assert!(rx.try_recv().is_err());
        hub.publish("shop.example", &SyncEvent::started("shop.example", 0));
        assert_eq!(
            rx.recv().await.expect("event after publish").kind,
            SyncEventKind::Started
        );
    }
}
