//! Subscriber registry, resume ring and broadcaster for the fan-out engine.
//!
//! The registry is process-wide mutable state with a clear lifecycle
//! (created at Manager construction, torn down at Manager stop) funneled
//! through one reader-preferring lock; no back-pointers exist between a
//! `Subscription` and the `Registry` that created it.

#![forbid(unsafe_code)]

mod broadcast;
mod delivery;
mod registry;
mod resume;
mod subscriber;

pub use broadcast::{broadcast, BroadcastReport, ScopeReport};
pub use registry::Registry;
pub use subscriber::Subscription;

#[cfg(test)]
mod integration_tests {
    use std::time::Duration;

    use fanout_core::{Domain, DropReason, Limits, Update, UpdateType};

    use super::*;

    fn limits_with_buffer(sub_buffer: usize) -> Limits {
        Limits { sub_buffer, ..Limits::default() }
    }

    #[tokio::test]
    async fn s1_basic_fan_out() {
        let registry = Registry::new(Limits::default());
        let sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();

        let mut update = Update::new(UpdateType::Added, Domain::Pods, "", "cluster-1", "dev");
        update.name = "pod-1".into();
        update.uid = "pod-uid".into();
        update.resource_version = "12".into();
        update.row = Some(serde_json::json!({"status": "Running"}));

        broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], update);

        let received = tokio::time::timeout(Duration::from_secs(1), sub.recv()).await.unwrap();
        assert_eq!(received.update_type, UpdateType::Added);
        assert_eq!(received.scope, "namespace:default");
        assert_eq!(received.name, "pod-1");
        assert_eq!(received.sequence.as_deref(), Some("1"));
        assert!(received.row.is_some());
    }

    #[tokio::test]
    async fn s2_backlog_triggers_reset_without_drop() {
        let registry = Registry::new(limits_with_buffer(256));
        let mut sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();

        for i in 0..257 {
            let mut update = Update::new(UpdateType::Modified, Domain::Pods, "", "cluster-1", "dev");
            update.name = format!("pod-{i}");
            broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], update);
        }

        let mut last = None;
        loop {
            let Ok(next) = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await else {
                break;
            };
            last = Some(next);
        }
        assert_eq!(last.unwrap().update_type, UpdateType::Reset);

        let dropped = tokio::time::timeout(Duration::from_millis(50), sub.dropped()).await;
        assert!(dropped.is_err(), "no COMPLETE should follow a reset-only overflow");
    }

    #[tokio::test]
    async fn s6_resume_after_two_broadcasts() {
        let registry = Registry::new(Limits::default());
        let _sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();

        for _ in 0..2 {
            let update = Update::new(UpdateType::Modified, Domain::Pods, "", "cluster-1", "dev");
            broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], update);
        }

        let (updates, ok) = registry.resume(Domain::Pods, "namespace:default", 1);
        assert!(ok);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].sequence.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn cancel_collapses_empty_scope() {
        let registry = Registry::new(Limits::default());
        let sub = registry.subscribe(Domain::NamespaceConfig, "namespace:default").unwrap();
        assert_eq!(registry.subscriber_count(Domain::NamespaceConfig, "namespace:default"), 1);
        sub.cancel();
        assert_eq!(registry.subscriber_count(Domain::NamespaceConfig, "namespace:default"), 0);
    }

    #[tokio::test]
    async fn max_subs_per_scope_boundary() {
        let limits = Limits { max_subs_per_scope: 3, ..limits_with_buffer(4) };
        let registry = Registry::new(limits);
        let mut oks = 0;
        let mut errs = 0;
        let mut kept = Vec::new();
        for _ in 0..4 {
            match registry.subscribe(Domain::Nodes, "") {
                Ok(sub) => {
                    oks += 1;
                    kept.push(sub);
                }
                Err(_) => errs += 1,
            }
        }
        assert_eq!(oks, 3);
        assert_eq!(errs, 1);
    }

    #[tokio::test]
    async fn resyncing_subscriber_is_skipped_until_cleared() {
        let registry = Registry::new(limits_with_buffer(1));
        let sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();

        // First broadcast fills the one-slot buffer.
        broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], Update::new(UpdateType::Modified, Domain::Pods, "", "c1", "dev"));
        // Second broadcast overflows it: RESET replaces the sole entry, subscriber marked resyncing.
        broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], Update::new(UpdateType::Modified, Domain::Pods, "", "c1", "dev"));
        // Third broadcast should be skipped entirely (still resyncing, queue already has the RESET).
        broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], Update::new(UpdateType::Modified, Domain::Pods, "", "c1", "dev"));

        let received = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await.unwrap();
        assert_eq!(received.update_type, UpdateType::Reset);

        sub.clear_resyncing();
        broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], Update::new(UpdateType::Modified, Domain::Pods, "", "c1", "dev"));
        let received = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await.unwrap();
        assert_eq!(received.update_type, UpdateType::Modified);

        let _ = DropReason::Closed;
    }
}

#[cfg(test)]
mod property_tests {
    use fanout_core::{Domain, Limits, Update, UpdateType};
    use proptest::prelude::*;

    use crate::{broadcast, Registry};

    proptest! {
        /// Invariant 2 (spec §8): sequence numbers per (domain, scope) are
        /// strictly monotonic and gap-free for the lifetime of a buffer.
        #[test]
        fn sequence_monotonic_and_gap_free(n in 1usize..50) {
            let registry = Registry::new(Limits::default());
            let _sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();
            for i in 1..=n {
                let update = Update::new(UpdateType::Modified, Domain::Pods, "", "c1", "dev");
                let report = broadcast(&registry, Domain::Pods, &["namespace:default".to_string()], update);
                prop_assert_eq!(report.per_scope.len(), 1);
                let (updates, ok) = registry.resume(Domain::Pods, "namespace:default", (i - 1) as u64);
                prop_assert!(ok);
                prop_assert_eq!(updates.len(), 1);
                prop_assert_eq!(updates[0].sequence.as_deref(), Some(i.to_string().as_str()));
            }
        }

        /// Invariant 4 (spec §8): Subscribe then immediate cancel never
        /// leaks entries in the registry, across a sequence of random
        /// subscribe/cancel interleavings.
        #[test]
        fn subscribe_cancel_never_leaks(count in 1usize..20) {
            let registry = Registry::new(Limits::default());
            for _ in 0..count {
                let sub = registry.subscribe(Domain::NamespaceWorkloads, "namespace:default").unwrap();
                sub.cancel();
            }
            prop_assert_eq!(registry.subscriber_count(Domain::NamespaceWorkloads, "namespace:default"), 0);
        }
    }
}
