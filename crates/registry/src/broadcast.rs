use std::sync::atomic::Ordering;
use std::sync::Arc;

use fanout_core::{Domain, DropReason, Update};

use crate::delivery::PushOutcome;
use crate::registry::Registry;
use crate::subscriber::SubscriberState;

/// Per-call delivery tally, one entry per target scope (spec §4.4
/// "telemetry: per scope, emit (delivered, backpressureEvents)").
#[derive(Debug, Clone, Default)]
pub struct ScopeReport {
    pub scope: String,
    pub delivered: usize,
    pub resyncs: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub per_scope: Vec<ScopeReport>,
}

/// Fans `update` out to every live subscriber of `scopes` under `domain`.
/// See spec §4.4 for the exact lock discipline this follows: the registry
/// lock is held only for the sequence stamp + resume-ring append + recipient
/// snapshot; every channel operation happens after it is released.
pub fn broadcast(registry: &Arc<Registry>, domain: Domain, scopes: &[String], update: Update) -> BroadcastReport {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut deduped = Vec::with_capacity(scopes.len());
    for raw in scopes {
        let trimmed = raw.trim().to_string();
        if seen.insert(trimmed.clone()) {
            deduped.push(trimmed);
        }
    }

    let mut report = BroadcastReport::default();
    for scope in deduped {
        let Some((stamped, recipients)) = registry.stamp_and_snapshot(domain, &scope, update.clone()) else {
            continue;
        };

        let mut scope_report = ScopeReport { scope: scope.clone(), ..Default::default() };
        for sub in &recipients {
            deliver_one(registry, domain, &scope, &stamped, sub, &mut scope_report);
        }

        metrics::counter!("fanout_delivered_total", scope_report.delivered as u64, "domain" => domain.to_string());
        if scope_report.resyncs > 0 {
            metrics::counter!("fanout_backpressure_resets_total", scope_report.resyncs as u64, "domain" => domain.to_string());
        }
        if scope_report.dropped > 0 {
            metrics::counter!("fanout_backpressure_drops_total", scope_report.dropped as u64, "domain" => domain.to_string());
        }
        tracing::debug!(
            domain = %domain,
            scope = %scope,
            delivered = scope_report.delivered,
            resyncs = scope_report.resyncs,
            dropped = scope_report.dropped,
            "broadcast"
        );
        report.per_scope.push(scope_report);
    }

    report
}

fn deliver_one(registry: &Arc<Registry>, domain: Domain, scope: &str, update: &Update, sub: &Arc<SubscriberState>, report: &mut ScopeReport) {
    if sub.closed.load(Ordering::Acquire) {
        return;
    }
    if sub.resyncing.load(Ordering::Acquire) {
        return;
    }

    match sub.queue.try_push(update.clone()) {
        PushOutcome::Delivered => report.delivered += 1,
        PushOutcome::Full => {
            let reset = Update::reset(domain, scope.to_string(), update.cluster_id.clone(), update.cluster_name.clone());
            sub.resyncing.store(true, Ordering::Release);
            match sub.queue.evict_oldest_and_push(reset) {
                Ok(()) => {
                    report.resyncs += 1;
                    tracing::warn!(domain = %domain, scope = %scope, subscriber_id = sub.id, "subscriber saturated, issuing reset");
                }
                Err(()) => {
                    report.dropped += 1;
                    tracing::warn!(domain = %domain, scope = %scope, subscriber_id = sub.id, "subscriber saturated past reset, dropping");
                    let registry = Arc::clone(registry);
                    let domain_owned = domain;
                    let scope_owned = scope.to_string();
                    let id = sub.id;
                    tokio::spawn(async move {
                        registry.remove(domain_owned, &scope_owned, id, DropReason::Backpressure);
                    });
                }
            }
        }
    }
}
