//! Subscriber registry with latest-wins delivery
//!
//! Every subscription owns a mailbox that holds at most one pending
//! description. Publishing replaces whatever is pending, so the publisher
//! never waits on a slow reader and a reader always sees the newest value.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::Rng as _;
use tokio::sync::Notify;
use tracing::debug;

use crate::description::ServerDescription;
use crate::error::MonitorError;
use crate::metrics::metrics;

#[derive(Debug, Default)]
struct Slot {
    pending: Option<Arc<ServerDescription>>,
    closed: bool,
}

/// Single-slot mailbox shared by the registry and one `Subscription`
#[derive(Debug, Default)]
struct Mailbox {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Mailbox {
    /// Drop any stale pending description and store `desc`
    fn deliver(&self, desc: Arc<ServerDescription>) {
        {
            let mut slot = self.slot.lock();
            if slot.closed {
                return;
            }
            slot.pending = Some(desc);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.slot.lock().closed = true;
        self.notify.notify_one();
    }
}

/// Error from `Subscription::try_recv`
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    #[error("no description pending")]
    Empty,
    #[error("subscription closed")]
    Closed,
}

/// Read side of a subscription
///
/// Holds the most recent undelivered description, if any. Once the
/// subscription is closed a pending description can still be read, after
/// which `recv` returns `None`.
///
/// Dropping a subscription removes it from its monitor.
#[derive(Debug)]
pub struct Subscription {
    mailbox: Arc<Mailbox>,
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Wait for the next description
    ///
    /// Returns `None` once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<ServerDescription>> {
        loop {
            match self.try_recv() {
                Ok(desc) => return Some(desc),
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => self.mailbox.notify.notified().await,
            }
        }
    }

    /// Take the pending description without waiting
    pub fn try_recv(&mut self) -> Result<Arc<ServerDescription>, TryRecvError> {
        let mut slot = self.mailbox.slot.lock();
        match slot.pending.take() {
            Some(desc) => Ok(desc),
            None if slot.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Whether the subscription was closed by unsubscribe or monitor shutdown
    pub fn is_closed(&self) -> bool {
        self.mailbox.slot.lock().closed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                debug!(id = self.id, "Subscription dropped");
            }
        }
    }
}

/// Handle that removes a subscription from its monitor
///
/// Calling `unsubscribe` more than once, or after the monitor has stopped,
/// does nothing.
#[derive(Debug)]
pub struct Unsubscribe {
    id: u64,
    registry: Weak<Registry>,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                debug!(id = self.id, "Subscription removed");
            }
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    subscribers: HashMap<u64, Arc<Mailbox>>,
    /// Set once on shutdown, never cleared
    closed: bool,
}

/// Subscriber registry guarded by a single lock
#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Register a new subscription seeded with `current()`
    ///
    /// `current` runs under the registry lock so a concurrent publish cannot
    /// slip in between seeding and registration.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        current: impl FnOnce() -> Arc<ServerDescription>,
    ) -> Result<(Subscription, Unsubscribe), MonitorError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(MonitorError::Stopped);
        }

        let mailbox = Arc::new(Mailbox::default());
        mailbox.deliver(current());

        let mut rng = rand::thread_rng();
        let mut id: u64 = rng.gen();
        while state.subscribers.contains_key(&id) {
            id = rng.gen();
        }
        state.subscribers.insert(id, mailbox.clone());
        metrics().subscribers.inc();

        let unsubscribe = Unsubscribe {
            id,
            registry: Arc::downgrade(self),
        };
        let subscription = Subscription {
            mailbox,
            id,
            registry: Arc::downgrade(self),
        };
        Ok((subscription, unsubscribe))
    }

    /// Deliver `desc` to every current subscriber
    pub(crate) fn publish(&self, desc: &Arc<ServerDescription>) {
        let state = self.state.lock();
        for mailbox in state.subscribers.values() {
            mailbox.deliver(desc.clone());
        }
    }

    /// Remove and close one subscription, returns false if already gone
    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        match state.subscribers.remove(&id) {
            Some(mailbox) => {
                mailbox.close();
                metrics().subscribers.dec();
                true
            }
            None => false,
        }
    }

    /// Close every subscription and refuse new ones
    ///
    /// Returns how many subscriptions were closed.
    pub(crate) fn close_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.subscribers.len();
        for (_, mailbox) in state.subscribers.drain() {
            mailbox.close();
        }
        state.closed = true;
        metrics().subscribers.sub(count as i64);
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
