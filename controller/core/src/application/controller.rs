// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Controller Loop
//!
//! Drains the record store's watch stream into a bounded work queue and
//! runs a small fixed pool of reconciliation workers over it. Ordering is
//! only meaningful per request name and is enforced by the reconciler's
//! idempotency check, not by the queue; unrelated requests reconcile
//! concurrently and out of order.
//!
//! Workers hold no shared mutable state — the record store client is the
//! only shared resource — so there is no locking here beyond the queue
//! itself.

use crate::application::reconciler::{Outcome, Reconciler};
use crate::domain::config::ControllerConfig;
use crate::domain::record::RecordKind;
use crate::domain::store::{ChangeType, RecordEvent, RecordStore};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bound on queued build-request identities; intake applies backpressure
/// to the watch stream when full.
const WORK_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
struct WorkItem {
    namespace: String,
    name: String,
}

/// The controller: watch intake plus a fixed reconciliation worker pool.
pub struct Controller {
    store: Arc<dyn RecordStore>,
    config: Arc<ControllerConfig>,
}

impl Controller {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<ControllerConfig>) -> Self {
        Self { store, config }
    }

    /// Run until the shutdown token fires. In-flight reconciliations run
    /// to completion; nothing is cancelled mid-call.
    pub async fn run(&self, shutdown: CancellationToken) {
        let worker_count = self.config.worker_count.max(1);
        info!(
            namespace = self.config.namespace.as_str(),
            workers = worker_count,
            "forge controller started"
        );

        let (tx, rx) = mpsc::channel::<WorkItem>(WORK_QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        let reconciler = Arc::new(Reconciler::new(self.store.clone(), self.config.clone()));

        let mut tasks = Vec::with_capacity(worker_count + 1);

        let events = self.store.subscribe();
        tasks.push(tokio::spawn(intake(events, tx, shutdown.clone())));

        for worker in 0..worker_count {
            let rx = rx.clone();
            let reconciler = reconciler.clone();
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                worker_loop(worker, rx, reconciler, shutdown).await;
            }));
        }

        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "controller task panicked");
            }
        }
        info!("forge controller stopped");
    }
}

/// Forward build-request notifications from the watch stream onto the
/// work queue. Kind classification already happened at the watch
/// boundary, so this matches on the closed set.
async fn intake(
    mut events: broadcast::Receiver<RecordEvent>,
    tx: mpsc::Sender<WorkItem>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                if event.kind != RecordKind::BuildRequest || event.change == ChangeType::Deleted {
                    continue;
                }
                let item = WorkItem {
                    namespace: event.namespace,
                    name: event.name,
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "watch stream lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    reconciler: Arc<Reconciler>,
    shutdown: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = shutdown.cancelled() => break,
            item = async { rx.lock().await.recv().await } => match item {
                Some(item) => item,
                None => break,
            },
        };

        match reconciler.reconcile(&item.namespace, &item.name).await {
            Ok(Outcome::Submitted) => {
                debug!(worker, build = item.name.as_str(), "submitted");
            }
            Ok(Outcome::DuplicateSkip) => {
                info!(worker, build = item.name.as_str(), "duplicate, skipped");
            }
            Ok(Outcome::FilteredOut) => {
                debug!(worker, name = item.name.as_str(), "filtered out");
            }
            Err(err) => {
                error!(
                    worker,
                    build = item.name.as_str(),
                    error = %err,
                    "reconciliation failed"
                );
            }
        }
    }
    debug!(worker, "reconciliation worker stopped");
}
