use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use fanout_core::{Domain, DropReason};

use crate::delivery::DeliveryQueue;

/// Registry-side state for one subscription. Never handed out directly;
/// the registry keeps `Arc<SubscriberState>` in its maps and the caller gets
/// a `Subscription` wrapping the same queue plus a cancel hook.
pub(crate) struct SubscriberState {
    pub id: u64,
    pub queue: Arc<DeliveryQueue>,
    pub resyncing: AtomicBool,
    pub closed: AtomicBool,
    pub drop_tx: watch::Sender<Option<DropReason>>,
}

impl SubscriberState {
    pub fn new(id: u64, buffer: usize) -> (Arc<Self>, watch::Receiver<Option<DropReason>>) {
        let (drop_tx, drop_rx) = watch::channel(None);
        let state = Arc::new(Self {
            id,
            queue: Arc::new(DeliveryQueue::new(buffer)),
            resyncing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            drop_tx,
        });
        (state, drop_rx)
    }

    /// Publishes `reason` at most once; later calls are no-ops (spec §3:
    /// "closing must ... publish at most one DropReason").
    pub fn close(&self, reason: DropReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.drop_tx.send(Some(reason));
    }
}

/// A closure-like cancel hook captured at `Subscribe` time; see spec §4.5 and
/// §9 ("no back-pointers exist between Subscription and Registry").
pub struct CancelHook(Box<dyn FnOnce() + Send>);

impl CancelHook {
    pub(crate) fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn call(self) {
        (self.0)()
    }
}

/// The handle returned by `Registry::subscribe`.
pub struct Subscription {
    pub domain: Domain,
    pub scope: String,
    pub id: u64,
    state: Arc<SubscriberState>,
    drop_rx: watch::Receiver<Option<DropReason>>,
    cancel: Option<CancelHook>,
}

impl Subscription {
    pub(crate) fn new(
        domain: Domain,
        scope: String,
        id: u64,
        state: Arc<SubscriberState>,
        drop_rx: watch::Receiver<Option<DropReason>>,
        cancel: CancelHook,
    ) -> Self {
        Self { domain, scope, id, state, drop_rx, cancel: Some(cancel) }
    }

    pub async fn recv(&self) -> fanout_core::Update {
        self.state.queue.recv().await
    }

    /// An independently owned clone of the drop-signal receiver, so a caller
    /// can race it against `recv` without the two needing simultaneous
    /// `&self`/`&mut self` access to this `Subscription` (see `dropped`).
    pub fn watch_drop(&self) -> watch::Receiver<Option<DropReason>> {
        self.drop_rx.clone()
    }

    /// Called by the session forwarder once it has read past a `RESET` it
    /// received from this subscription, so the broadcaster resumes
    /// delivering instead of skipping this subscriber indefinitely (spec
    /// §4.4: "it will be resynced when it drains its queue past the RESET
    /// marker").
    pub fn clear_resyncing(&self) {
        self.state.resyncing.store(false, Ordering::Release);
    }

    /// Resolves once the subscription is torn down, yielding the reason.
    /// A session's per-subscription forwarder awaits this alongside `recv`.
    pub async fn dropped(&mut self) -> DropReason {
        loop {
            if let Some(reason) = *self.drop_rx.borrow() {
                return reason;
            }
            if self.drop_rx.changed().await.is_err() {
                return DropReason::Closed;
            }
        }
    }

    /// Explicit CANCEL. The registry entry is removed and the drop channel
    /// publishes `Closed`; `Drop` performs the same teardown for handles that
    /// go out of scope without an explicit cancel.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hook) = self.cancel.take() {
            hook.call();
        }
    }
}
