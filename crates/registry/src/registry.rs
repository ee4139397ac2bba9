use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use fanout_core::{Domain, DropReason, FanoutError, FanoutResult, Limits, Update};

use crate::resume::ResumeRing;
use crate::subscriber::{CancelHook, SubscriberState, Subscription};

/// Per-(domain, scope) state: the live subscriber set, the monotonic
/// sequence counter, and the resume ring. Evicted as a unit once the last
/// subscriber leaves (spec §3 invariant 4).
struct ScopeState {
    subs: FxHashMap<u64, Arc<SubscriberState>>,
    sequence: u64,
    resume: ResumeRing,
}

impl ScopeState {
    fn new(resume_buffer: usize) -> Self {
        Self { subs: FxHashMap::default(), sequence: 0, resume: ResumeRing::with_capacity(resume_buffer) }
    }
}

type DomainMap = FxHashMap<Domain, FxHashMap<String, ScopeState>>;

/// The subscriber registry: `domain -> scope -> id -> Subscription`, guarded
/// by a single reader-preferring lock (spec §3, §5). Never held across a
/// channel send; see `Broadcaster::broadcast` for the lock discipline.
pub struct Registry {
    inner: RwLock<DomainMap>,
    next_id: AtomicU64,
    limits: Limits,
    self_ref: Weak<Registry>,
}

impl Registry {
    pub fn new(limits: Limits) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            inner: RwLock::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            limits,
            self_ref: weak.clone(),
        })
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// `Subscribe(domain, scope)` (spec §4.5). Normalizes the scope, enforces
    /// `MAX_SUBS_PER_SCOPE`, and eagerly creates the scope's resume ring
    /// (§9 open question 3) so a reconnect-before-any-broadcast `Resume`
    /// still reports `ok=true`.
    pub fn subscribe(&self, domain: Domain, raw_scope: &str) -> FanoutResult<Subscription> {
        let scope = fanout_core::normalize_scope(domain, raw_scope)?;

        let mut guard = self.inner.write();
        let scope_state = guard.entry(domain).or_default().entry(scope.clone()).or_insert_with(|| ScopeState::new(self.limits.resume_buffer));

        if scope_state.subs.len() >= self.limits.max_subs_per_scope {
            return Err(FanoutError::LimitExceeded(format!(
                "domain {domain} scope {scope} already has {} subscribers",
                self.limits.max_subs_per_scope
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (state, drop_rx) = SubscriberState::new(id, self.limits.sub_buffer);
        scope_state.subs.insert(id, Arc::clone(&state));
        let subscriber_count = scope_state.subs.len();
        drop(guard);

        metrics::gauge!("fanout_subscribers", subscriber_count as f64, "domain" => domain.to_string(), "scope" => scope.clone());
        tracing::debug!(domain = %domain, scope = %scope, subscriber_id = id, "subscribed");

        let registry = self.self_ref.upgrade().expect("registry outlives its own subscriptions");
        let cancel_domain = domain;
        let cancel_scope = scope.clone();
        let cancel_id = id;
        let hook = CancelHook::new(move || registry.remove(cancel_domain, &cancel_scope, cancel_id, DropReason::Closed));

        Ok(Subscription::new(domain, scope, id, state, drop_rx, hook))
    }

    /// Removes a subscriber (explicit cancel or broadcaster-triggered
    /// eviction), collapsing empty parent maps and evicting the scope's
    /// resume state once the last subscriber leaves (spec §4.5, invariant 1).
    pub(crate) fn remove(&self, domain: Domain, scope: &str, id: u64, reason: DropReason) {
        let mut guard = self.inner.write();
        let Some(scopes) = guard.get_mut(&domain) else { return };
        let Some(scope_state) = scopes.get_mut(scope) else { return };
        let Some(state) = scope_state.subs.remove(&id) else { return };
        let now_empty = scope_state.subs.is_empty();
        if now_empty {
            scopes.remove(scope);
            if scopes.is_empty() {
                guard.remove(&domain);
            }
        }
        drop(guard);

        state.close(reason);
        tracing::debug!(domain = %domain, scope = %scope, subscriber_id = id, reason = reason.as_str(), "unsubscribed");
    }

    /// `Resume(domain, scope, sinceSeq)` (spec §4.6).
    pub fn resume(&self, domain: Domain, scope: &str, since_seq: u64) -> (Vec<Update>, bool) {
        let guard = self.inner.read();
        let Some(scope_state) = guard.get(&domain).and_then(|scopes| scopes.get(scope)) else {
            return (Vec::new(), false);
        };
        scope_state.resume.since(since_seq)
    }

    /// Stamps a sequence number, appends to the resume ring, and snapshots
    /// the live recipients for `(domain, scope)` under one short write-lock
    /// section. Returns `None` if the scope has never been subscribed to
    /// (no ring exists and there is nothing to deliver).
    pub(crate) fn stamp_and_snapshot(&self, domain: Domain, scope: &str, mut update: Update) -> Option<(Update, Vec<Arc<SubscriberState>>)> {
        let mut guard = self.inner.write();
        let scope_state = guard.get_mut(&domain)?.get_mut(scope)?;
        scope_state.sequence += 1;
        update.scope = scope.to_string();
        let stamped = update.with_sequence(scope_state.sequence);
        scope_state.resume.append(scope_state.sequence, stamped.clone());
        let recipients = scope_state.subs.values().cloned().collect();
        Some((stamped, recipients))
    }

    pub fn subscriber_count(&self, domain: Domain, scope: &str) -> usize {
        self.inner.read().get(&domain).and_then(|scopes| scopes.get(scope)).map(|s| s.subs.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::Domain;

    #[test]
    fn subscribe_then_cancel_leaves_no_trace() {
        let registry = Registry::new(Limits::default());
        let sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();
        assert_eq!(registry.subscriber_count(Domain::Pods, "namespace:default"), 1);
        sub.cancel();
        assert_eq!(registry.subscriber_count(Domain::Pods, "namespace:default"), 0);
        assert!(registry.inner.read().is_empty());
    }

    #[test]
    fn limit_exceeded_past_max() {
        let limits = Limits { max_subs_per_scope: 2, ..Limits::default() };
        let registry = Registry::new(limits);
        let _a = registry.subscribe(Domain::Nodes, "").unwrap();
        let _b = registry.subscribe(Domain::Nodes, "").unwrap();
        assert!(matches!(registry.subscribe(Domain::Nodes, ""), Err(FanoutError::LimitExceeded(_))));
    }

    #[test]
    fn resume_without_prior_subscribe_reports_no_buffer() {
        let registry = Registry::new(Limits::default());
        let (updates, ok) = registry.resume(Domain::Pods, "namespace:default", 0);
        assert!(!ok);
        assert!(updates.is_empty());
    }

    #[test]
    fn resume_right_after_subscribe_is_current() {
        let registry = Registry::new(Limits::default());
        let _sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();
        let (updates, ok) = registry.resume(Domain::Pods, "namespace:default", 0);
        assert!(ok);
        assert!(updates.is_empty());
    }
}
