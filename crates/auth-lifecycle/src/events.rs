//! Session-changed notification hub.
//!
//! Observer pattern: subscribers register callbacks and are invoked on every
//! transition that changes authentication status. The event carries no
//! payload; consumers re-query `is_logged_in()` / `current_user()`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::warn;

type Subscriber = Arc<dyn Fn() + Send + Sync>;

/// Fan-out hub for the zero-payload `SessionChanged` notification.
#[derive(Default)]
pub struct SessionChangedHub {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SessionChangedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every session change.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.subscribers.lock().unwrap().push(Arc::new(callback));
    }

    /// Notify every subscriber.
    ///
    /// Callbacks run outside the subscriber-list lock, and a panicking
    /// subscriber does not stop the rest from being notified.
    pub fn emit(&self) {
        let subscribers: Vec<Subscriber> = self.subscribers.lock().unwrap().clone();
        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber.as_ref()())).is_err() {
                warn!("SessionChanged subscriber panicked");
            }
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let hub = SessionChangedHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            hub.subscribe(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        hub.emit();
        hub.emit();
        assert_eq!(count.load(Ordering::SeqCst), 6);
        assert_eq!(hub.subscriber_count(), 3);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let hub = SessionChangedHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        hub.subscribe(|| panic!("subscriber bug"));
        {
            let count = count.clone();
            hub.subscribe(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        hub.emit();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The hub still works for later emissions.
        hub.emit();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let hub = SessionChangedHub::new();
        hub.emit();
    }
}
