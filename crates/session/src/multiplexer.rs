//! Session Multiplexer (spec §4.8): one instance per websocket. Owns
//! subscription lifetimes for the session, forwards updates to the outgoing
//! queue, and pushes heartbeats on a fixed interval.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{interval, timeout};

use fanout_core::{Domain, DropReason, Limits, Update, UpdateType};
use fanout_registry::Registry;

use crate::frame::{ClientFrame, FrameReceiver, FrameSender, FrameTransport};

struct ForwarderHandle {
    stop: Arc<Notify>,
}

/// Per-websocket session state. `run` consumes a [`FrameTransport`] and
/// drives the session until the transport closes or a write deadline is
/// missed; it does not return until both the reader and writer have stopped.
pub struct SessionMultiplexer {
    registry: Arc<Registry>,
    cluster_id: String,
    cluster_name: String,
    limits: Limits,
    out_tx: mpsc::Sender<Update>,
    out_rx: Mutex<Option<mpsc::Receiver<Update>>>,
    subs: Mutex<HashMap<(Domain, String), ForwarderHandle>>,
    closed: AtomicBool,
}

impl SessionMultiplexer {
    pub fn new(registry: Arc<Registry>, cluster_id: impl Into<String>, cluster_name: impl Into<String>, limits: Limits) -> Arc<Self> {
        let (out_tx, out_rx) = mpsc::channel(limits.out_buffer);
        Arc::new(Self {
            registry,
            cluster_id: cluster_id.into(),
            cluster_name: cluster_name.into(),
            limits,
            out_tx,
            out_rx: Mutex::new(Some(out_rx)),
            subs: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Drives the session to completion: splits `transport`, spawns the
    /// reader and writer tasks, and waits for both.
    pub async fn run<T>(self: Arc<Self>, transport: T)
    where
        T: FrameTransport,
    {
        let (sender, receiver) = transport.split();
        let out_rx = self.out_rx.lock().unwrap().take().expect("SessionMultiplexer::run called more than once");

        let writer = tokio::spawn(Arc::clone(&self).write_loop(sender, out_rx));
        let reader = tokio::spawn(Arc::clone(&self).read_loop(receiver));

        let _ = tokio::join!(writer, reader);
        self.shutdown();
    }

    async fn write_loop<S: FrameSender>(self: Arc<Self>, mut sender: S, mut out_rx: mpsc::Receiver<Update>) {
        let mut heartbeat = interval(self.limits.heartbeat_interval());
        loop {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            tokio::select! {
                biased;
                maybe_update = out_rx.recv() => {
                    let Some(update) = maybe_update else { break };
                    if timeout(self.limits.write_timeout(), sender.send(&update)).await.is_err() {
                        tracing::warn!("write deadline exceeded, shutting down session");
                        self.shutdown();
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    let hb = Update::heartbeat(self.cluster_id.clone(), self.cluster_name.clone());
                    if timeout(self.limits.write_timeout(), sender.send(&hb)).await.is_err() {
                        tracing::warn!("heartbeat write deadline exceeded, shutting down session");
                        self.shutdown();
                        break;
                    }
                }
            }
        }
    }

    async fn read_loop<R: FrameReceiver>(self: Arc<Self>, mut receiver: R) {
        loop {
            match receiver.recv().await {
                Ok(Some(ClientFrame::Request { domain, scope, cluster_id })) => {
                    Self::handle_request(Arc::clone(&self), domain, scope, cluster_id).await;
                }
                Ok(Some(ClientFrame::Cancel { domain, scope })) => {
                    self.handle_cancel(domain, &scope);
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "transport read error");
                    break;
                }
            }
            if self.closed.load(Ordering::Acquire) {
                break;
            }
        }
        self.shutdown();
    }

    async fn handle_request(session: Arc<Self>, domain: Domain, scope: String, cluster_id: Option<String>) {
        if let Some(requested) = &cluster_id {
            if requested != &session.cluster_id {
                let error = Update::error_frame(domain, scope, session.cluster_id.clone(), session.cluster_name.clone(), "cluster id mismatch");
                Self::send_outgoing(&session, error);
                return;
            }
        }

        match session.registry.subscribe(domain, &scope) {
            Ok(sub) => {
                let canonical_scope = sub.scope.clone();
                let reset = Update::reset(domain, canonical_scope.clone(), session.cluster_id.clone(), session.cluster_name.clone());
                Self::send_outgoing(&session, reset);
                Self::spawn_forwarder(Arc::clone(&session), domain, canonical_scope, sub);
            }
            Err(err) => {
                let error = Update::error_frame(domain, scope, session.cluster_id.clone(), session.cluster_name.clone(), err.to_string());
                Self::send_outgoing(&session, error);
            }
        }
    }

    /// Non-blocking send to the outgoing queue. A full queue is fatal (spec
    /// §7: "outgoing queue overflow" → "session shuts down"), not something
    /// the sending task should block on.
    fn send_outgoing(session: &Arc<Self>, update: Update) {
        match session.out_tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(cluster_id = %session.cluster_id, "outgoing queue overflow, shutting down session");
                session.shutdown();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn spawn_forwarder(session: Arc<Self>, domain: Domain, scope: String, sub: fanout_registry::Subscription) {
        let stop = Arc::new(Notify::new());
        let key = (domain, scope.clone());
        session.subs.lock().unwrap().insert(key.clone(), ForwarderHandle { stop: Arc::clone(&stop) });

        tokio::spawn(async move {
            let mut drop_rx = sub.watch_drop();

            loop {
                tokio::select! {
                    biased;
                    _ = stop.notified() => break,
                    reason = wait_dropped(&mut drop_rx) => {
                        let complete = Update::complete(domain, scope.clone(), session.cluster_id.clone(), session.cluster_name.clone(), reason.as_str());
                        Self::send_outgoing(&session, complete);
                        break;
                    }
                    update = sub.recv() => {
                        // Clear the resync flag only after this forwarder has
                        // actually drained past the RESET the broadcaster
                        // issued on overflow, per spec §4.4: otherwise the
                        // broadcaster keeps skipping this subscriber forever.
                        let was_reset = update.update_type == UpdateType::Reset;
                        Self::send_outgoing(&session, update);
                        if was_reset {
                            sub.clear_resyncing();
                        }
                    }
                }
            }
            session.subs.lock().unwrap().remove(&key);
        });
    }

    /// `CANCEL {domain, scope}`. Unknown subscriptions are a no-op (spec §4.8).
    fn handle_cancel(&self, domain: Domain, scope: &str) {
        if let Some(handle) = self.subs.lock().unwrap().remove(&(domain, scope.to_string())) {
            handle.stop.notify_one();
        }
    }

    /// Idempotent session teardown: stops every live forwarder, which in
    /// turn drops its `Subscription` and cancels it in the registry.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(cluster_id = %self.cluster_id, "session shutdown");
        for (_, handle) in self.subs.lock().unwrap().drain() {
            handle.stop.notify_one();
        }
    }
}

async fn wait_dropped(drop_rx: &mut watch::Receiver<Option<DropReason>>) -> DropReason {
    loop {
        if let Some(reason) = *drop_rx.borrow() {
            return reason;
        }
        if drop_rx.changed().await.is_err() {
            return DropReason::Closed;
        }
    }
}
