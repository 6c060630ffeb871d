use tokio::sync::broadcast;

use crate::beacon::accounts::AccountIdentity;

const BUFFER_SIZE: usize = 100;

/// Raised after the converged account list changes (boot reconciliation, add,
/// logout). Carries the identities that survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsUpdate {
    pub accounts: Vec<AccountIdentity>,
}

/// Raised after a sync batch or reset rewrote an account's notification caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
    pub account: AccountIdentity,
}

/// Fan-out of change events to any number of observers.
pub(crate) struct StreamManager<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> StreamManager<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUFFER_SIZE);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn emit(&self, update: T) {
        // receiver_count() is O(1) - just reads an AtomicUsize
        if self.has_subscribers() {
            let _ = self.sender.send(update);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl<T: Clone> Default for StreamManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
