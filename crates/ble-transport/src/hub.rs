//! Notification fan-out
//!
//! BLE notifications arrive on a path independent of the caller. A
//! connection pushes every fragment into its [`FragmentHub`]; each
//! in-flight command holds a [`Subscription`] that receives the fragments
//! published while it is alive. Dropping the subscription unregisters it,
//! so a finished command never sees fragments meant for the next one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TransportError;

#[derive(Debug, Default)]
struct HubInner {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<Vec<u8>>>,
    closed: bool,
}

/// Fan-out point for notification fragments of one connection
#[derive(Debug, Clone, Default)]
pub struct FragmentHub {
    inner: Arc<Mutex<HubInner>>,
}

impl FragmentHub {
    /// Create an open hub with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new listener
    pub fn subscribe(&self) -> Result<Subscription, TransportError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.listeners.insert(id, tx);
        trace!("Fragment listener {} registered", id);

        Ok(Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// Deliver a fragment to every live listener
    pub fn publish(&self, fragment: &[u8]) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner
            .listeners
            .retain(|_, tx| tx.send(fragment.to_vec()).is_ok());
    }

    /// Close the hub; pending `recv` calls return `None` immediately
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.listeners.clear();
    }

    /// Whether the hub has been closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// A registered fragment listener; unregisters itself on drop
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    hub: Weak<Mutex<HubInner>>,
}

impl Subscription {
    /// Wait for the next fragment. `None` means the connection closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.remove(&self.id);
            trace!("Fragment listener {} released", self.id);
        }
    }
}
