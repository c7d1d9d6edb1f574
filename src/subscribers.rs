//! Subscriber set for broadcast messages
//!
//! Holds weak handles only; a consumer that has been dropped is pruned on the
//! next broadcast. Lives inside the engine loop, so there is no locking here.

use std::sync::{Arc, Weak};

use asus_smc_platform::{Subscriber, SubscriberId, SubscriberMessage};
use tracing::{debug, warn};

struct Entry {
    id: SubscriberId,
    name: String,
    handle: Weak<dyn Subscriber>,
}

/// Insertion-ordered, duplicate-free set of subscribers
#[derive(Default)]
pub struct SubscriberSet {
    entries: Vec<Entry>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns false if `id` is already attached.
    pub fn attach(&mut self, id: SubscriberId, subscriber: &Arc<dyn Subscriber>) -> bool {
        if self.entries.iter().any(|e| e.id == id) {
            debug!("Subscriber {} already attached", id);
            return false;
        }
        self.entries.push(Entry {
            id,
            name: subscriber.name().to_string(),
            handle: Arc::downgrade(subscriber),
        });
        debug!("Subscriber {} ({}) attached", id, subscriber.name());
        true
    }

    /// Remove a subscriber. Returns false if it wasn't attached.
    pub fn detach(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            debug!("Subscriber {} detached", id);
        }
        removed
    }

    /// Deliver a message to every live subscriber, in attach order
    ///
    /// Returns the number of successful deliveries. Failures are logged and
    /// never reach the caller.
    pub async fn broadcast(&mut self, message: &SubscriberMessage) -> usize {
        self.entries.retain(|e| {
            let alive = e.handle.strong_count() > 0;
            if !alive {
                debug!("Pruning dropped subscriber {} ({})", e.id, e.name);
            }
            alive
        });

        let mut delivered = 0;
        for entry in &self.entries {
            let Some(subscriber) = entry.handle.upgrade() else {
                continue;
            };
            match subscriber.deliver(message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Failed to deliver {} to {} ({}): {}",
                    message.kind(),
                    entry.id,
                    entry.name,
                    e
                ),
            }
        }
        delivered
    }

    /// Drop every subscriber
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attached ids, in attach order
    pub fn ids(&self) -> Vec<SubscriberId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}
