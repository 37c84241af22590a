//! Identity provider handle.
//!
//! # Responsibility
//! - Hold the current-user lifecycle as an explicit, shareable value.
//! - Notify subscribers whenever the resolved identity changes.
//!
//! # Invariants
//! - The lifecycle starts as `Resolving` and settles to signed in or out.
//! - Re-publishing the same state does not wake subscribers.

use crate::model::common::OwnerId;
use tokio::sync::watch;

/// Current-user lifecycle as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// Session provider has not settled yet.
    Resolving,
    SignedIn(OwnerId),
    SignedOut,
}

impl IdentityState {
    pub fn owner(&self) -> Option<&OwnerId> {
        match self {
            Self::SignedIn(owner) => Some(owner),
            Self::Resolving | Self::SignedOut => None,
        }
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, Self::Resolving)
    }
}

/// Publisher side of the identity lifecycle.
#[derive(Debug)]
pub struct IdentityProvider {
    sender: watch::Sender<IdentityState>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(IdentityState::Resolving);
        Self { sender }
    }

    pub fn sign_in(&self, owner: OwnerId) {
        self.publish(IdentityState::SignedIn(owner));
    }

    pub fn sign_out(&self) {
        self.publish(IdentityState::SignedOut);
    }

    pub fn current(&self) -> IdentityState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> IdentityWatcher {
        IdentityWatcher {
            receiver: self.sender.subscribe(),
        }
    }

    fn publish(&self, next: IdentityState) {
        self.sender.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

/// Subscriber side of the identity lifecycle.
#[derive(Debug, Clone)]
pub struct IdentityWatcher {
    receiver: watch::Receiver<IdentityState>,
}

impl IdentityWatcher {
    pub fn current(&self) -> IdentityState {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published state.
    ///
    /// Returns `None` once the provider has been dropped.
    pub async fn changed(&mut self) -> Option<IdentityState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
