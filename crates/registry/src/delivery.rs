use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use fanout_core::Update;

/// Bounded delivery queue for one subscription.
///
/// A plain `tokio::sync::mpsc` cannot express trigger-resync (it has no way
/// to peek or evict its head from the sender side), so the queue is hand
/// rolled: a mutex-guarded ring plus a `Notify` to wake a waiting reader.
/// `len()` against `cap` doubles as the backpressure gauge; no separate
/// in-flight counter is kept.
pub struct DeliveryQueue {
    inner: Mutex<VecDeque<Update>>,
    cap: usize,
    notify: Notify,
}

pub enum PushOutcome {
    Delivered,
    Full,
}

impl DeliveryQueue {
    pub fn new(cap: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(cap.min(1024))), cap: cap.max(1), notify: Notify::new() }
    }

    /// Non-blocking enqueue used on the broadcast hot path.
    pub fn try_push(&self, update: Update) -> PushOutcome {
        let mut guard = self.inner.lock();
        if guard.len() >= self.cap {
            return PushOutcome::Full;
        }
        guard.push_back(update);
        drop(guard);
        self.notify.notify_one();
        PushOutcome::Delivered
    }

    /// Evicts the oldest queued update, then pushes `replacement` in its
    /// place. Fails only if the queue still has no room after the eviction
    /// (possible only with a degenerate zero capacity).
    pub fn evict_oldest_and_push(&self, replacement: Update) -> Result<(), ()> {
        let mut guard = self.inner.lock();
        guard.pop_front();
        if guard.len() >= self.cap {
            return Err(());
        }
        guard.push_back(replacement);
        drop(guard);
        self.notify.notify_one();
        Ok(())
    }

    pub async fn recv(&self) -> Update {
        loop {
            if let Some(update) = self.inner.lock().pop_front() {
                return update;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::{Domain, UpdateType};

    fn upd() -> Update {
        Update::new(UpdateType::Modified, Domain::Pods, "namespace:default", "c1", "dev")
    }

    #[test]
    fn rejects_past_capacity() {
        let q = DeliveryQueue::new(2);
        assert!(matches!(q.try_push(upd()), PushOutcome::Delivered));
        assert!(matches!(q.try_push(upd()), PushOutcome::Delivered));
        assert!(matches!(q.try_push(upd()), PushOutcome::Full));
    }

    #[tokio::test]
    async fn recv_drains_in_order() {
        let q = DeliveryQueue::new(4);
        let mut first = upd();
        first.name = "a".into();
        let mut second = upd();
        second.name = "b".into();
        q.try_push(first);
        q.try_push(second);
        assert_eq!(q.recv().await.name, "a");
        assert_eq!(q.recv().await.name, "b");
    }

    #[test]
    fn evict_makes_room_for_reset() {
        let q = DeliveryQueue::new(1);
        q.try_push(upd());
        let mut reset = upd();
        reset.update_type = UpdateType::Reset;
        assert!(q.evict_oldest_and_push(reset).is_ok());
        assert_eq!(q.len(), 1);
    }
}
