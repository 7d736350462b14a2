//! Authorization-failure signal raised by the API client.
//!
//! Any request sent on behalf of the signed-in user that comes back `401`
//! notifies every registered listener before the error is returned to the
//! caller. Registrations are guards: dropping an `AuthFailureSubscription`
//! removes the listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

#[async_trait]
pub trait AuthFailureListener: Send + Sync {
    async fn on_auth_failure(&self);
}

type ListenerList = Vec<(u64, Arc<dyn AuthFailureListener>)>;

#[derive(Default)]
pub(crate) struct AuthFailureRegistry {
    next_id: AtomicU64,
    listeners: Mutex<ListenerList>,
}

impl AuthFailureRegistry {
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        listener: Arc<dyn AuthFailureListener>,
    ) -> AuthFailureSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, listener));
        debug!(id, "Auth failure listener registered");
        AuthFailureSubscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Run every registered listener to completion.
    pub(crate) async fn notify(&self) {
        let listeners: Vec<Arc<dyn AuthFailureListener>> =
            self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        debug!(count = listeners.len(), "Notifying auth failure listeners");
        join_all(listeners.iter().map(|l| l.on_auth_failure())).await;
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|(existing, _)| *existing != id);
        debug!(id, "Auth failure listener removed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerList> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a listener registered for as long as it is alive.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct AuthFailureSubscription {
    id: u64,
    registry: Weak<AuthFailureRegistry>,
}

impl AuthFailureSubscription {
    /// Unregister now. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for AuthFailureSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl AuthFailureListener for Counter {
        async fn on_auth_failure(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_notify_reaches_every_listener() {
        let registry = Arc::new(AuthFailureRegistry::default());
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        let _a = registry.subscribe(first.clone());
        let _b = registry.subscribe(second.clone());

        registry.notify().await;

        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_not_notified() {
        let registry = Arc::new(AuthFailureRegistry::default());
        let counter = Arc::new(Counter::default());
        let subscription = registry.subscribe(counter.clone());
        assert_eq!(registry.listener_count(), 1);

        subscription.unsubscribe();
        assert_eq!(registry.listener_count(), 0);

        registry.notify().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outliving_registry_drops_cleanly() {
        let registry = Arc::new(AuthFailureRegistry::default());
        let subscription = registry.subscribe(Arc::new(Counter::default()));
        drop(registry);
        drop(subscription);
    }
}
