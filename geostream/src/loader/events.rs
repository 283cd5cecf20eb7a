//! Loader event subscriptions.
//!
//! Listeners are called in subscription order, synchronously on the tick
//! that produced the event. Disposing a loader drops every listener before
//! its scopes are torn down, so teardown never reaches a listener.

use std::fmt;

use super::ScopeHandle;
use crate::error::LoadError;
use crate::scope::ScopeKey;

/// Scope lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    /// A scope was registered.
    ScopeCreated { handle: ScopeHandle, key: ScopeKey },
    /// A scope's payload was replaced.
    ScopeLoaded { handle: ScopeHandle, key: ScopeKey },
    /// A scope's load failed.
    ScopeFailed {
        handle: ScopeHandle,
        key: ScopeKey,
        error: LoadError,
    },
    /// A scope's load was cut short while the scope stayed registered.
    ScopeInterrupted { handle: ScopeHandle, key: ScopeKey },
    /// A scope was disposed and recycled.
    ScopeReleased { handle: ScopeHandle, key: ScopeKey },
}

impl LoaderEvent {
    /// Handle of the scope the event is about.
    pub fn handle(&self) -> ScopeHandle {
        match self {
            Self::ScopeCreated { handle, .. }
            | Self::ScopeLoaded { handle, .. }
            | Self::ScopeFailed { handle, .. }
            | Self::ScopeInterrupted { handle, .. }
            | Self::ScopeReleased { handle, .. } => *handle,
        }
    }

    /// Key of the scope the event is about.
    pub fn key(&self) -> &ScopeKey {
        match self {
            Self::ScopeCreated { key, .. }
            | Self::ScopeLoaded { key, .. }
            | Self::ScopeFailed { key, .. }
            | Self::ScopeInterrupted { key, .. }
            | Self::ScopeReleased { key, .. } => key,
        }
    }
}

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Event listener.
pub type Listener = Box<dyn FnMut(&LoaderEvent) + Send>;

/// Ordered listener list.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.listeners.len())
            .finish()
    }
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&mut self, event: &LoaderEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}
