//! Observer interface for identity change notifications.

use crate::Identity;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// Receives identity changes from a gateway.
///
/// Handlers must be idempotent: the same identity may be delivered more than
/// once (replay on subscribe, refresh of an unchanged user). Handlers run
/// outside the registry lock, so they may subscribe or release observers,
/// but they must not block: a gateway may deliver while it holds its own
/// session lock.
pub trait IdentityObserver: Send + Sync {
    /// `None` means no identity is active.
    fn identity_changed(&self, identity: Option<&Identity>);
}

/// Handle for a registered observer.
///
/// Releases the registration exactly once: on [`Subscription::unsubscribe`]
/// or, failing that, on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the registration now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    /// True until the registration has been released.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct Registrations {
    next_id: u64,
    observers: Vec<(u64, Arc<dyn IdentityObserver>)>,
}

/// Fan-out list of observers shared by gateway implementations.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<Mutex<Registrations>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. It stays registered until the returned handle is released.
    pub fn register(&self, observer: Arc<dyn IdentityObserver>) -> Subscription {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.observers.push((id, observer));
            id
        };
        debug!(observer_id = id, "Identity observer registered");

        let weak: Weak<Mutex<Registrations>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|p| p.into_inner());
                inner.observers.retain(|(existing, _)| *existing != id);
                debug!(observer_id = id, "Identity observer released");
            }
        })
    }

    /// Deliver a change to every registered observer, in registration order.
    pub fn notify(&self, identity: Option<&Identity>) {
        let observers: Vec<Arc<dyn IdentityObserver>> = self
            .lock()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in observers {
            observer.identity_changed(identity);
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Registrations> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}
