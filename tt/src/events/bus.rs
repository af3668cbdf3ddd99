//! Listener registry - ordered multicast subscription list
//!
//! Every observable entity (Progress, Task, Section, Manager) owns one
//! `Registry` per event kind. Listeners are plain closures behind `Arc`, so a
//! dispatcher can take a snapshot under its own lock, release the lock, and
//! then invoke the listeners without holding anything.
//!
//! # Delivery rules
//!
//! - Listeners are invoked in registration order.
//! - Registration is append-only; there is no unsubscribe. A listener lives as
//!   long as the entity that owns the registry.
//! - Dispatch always runs on a snapshot. A listener that registers another
//!   listener on the registry currently dispatching does not receive the event
//!   in flight; the new listener sees events from the next dispatch onward.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

/// Append-only list of listeners of type `L` (usually a `dyn Fn(..)`)
pub struct Registry<L: ?Sized> {
    listeners: Vec<Arc<L>>,
}

impl<L: ?Sized> Registry<L> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    /// Register a listener at the end of the delivery order
    pub fn add(&mut self, listener: Arc<L>) {
        self.listeners.push(listener);
        trace!(count = self.listeners.len(), "Registry::add: listener registered");
    }

    /// Copy the current listener list for dispatch outside the owner's lock
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.clone()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<L: ?Sized> Default for Registry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> Clone for Registry<L> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<L: ?Sized> fmt::Debug for Registry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("listeners", &self.listeners.len()).finish()
    }
}
