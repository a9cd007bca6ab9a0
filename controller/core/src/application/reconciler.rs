// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Reconciler
//!
//! Handles one build-request event end-to-end, terminal in a single pass:
//!
//! `Received → Filtered-out | Duplicate-skip | Submitted | Failed`
//!
//! filter → idempotency check → project lookup → resolve → build → submit.
//! The three store calls are the only suspension points. I/O failures are
//! classified exactly once here and never retried internally; redelivery
//! is the external queue's job. At-most-one execution per request name is
//! guaranteed by the fetch-existing-unit check combined with tolerating
//! `AlreadyExists` on submission — a concurrent loser of that race is
//! coerced to `Duplicate-skip`, never reported as failed.

use crate::application::builder::{self, BuildError};
use crate::application::resolver;
use crate::domain::config::ControllerConfig;
use crate::domain::record::{BuildRequest, Project, RecordKind};
use crate::domain::store::{RecordStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Terminal outcomes of one reconciliation pass. Failures travel as
/// [`ReconcileError`] instead so callers can log and count them apart
/// from the deliberate no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The record is not a build request (or vanished before we read it).
    FilteredOut,
    /// A unit with this name already exists; redelivery or a lost race.
    DuplicateSkip,
    /// The unit spec was built and accepted by the record store.
    Submitted,
}

/// Reconciliation failures, classified once at this boundary.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The merged configuration cannot produce a valid unit spec; nothing
    /// was submitted.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] BuildError),

    /// The build request names no project to resolve configuration from.
    #[error("build request {0} names no project")]
    MissingProject(String),

    /// Any store failure other than the expected not-found/already-exists
    /// answers; surfaced for the external retry policy.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reconciles single build-request events against the record store.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    config: Arc<ControllerConfig>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<ControllerConfig>) -> Self {
        Self { store, config }
    }

    /// Run one reconciliation pass for the named record.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Outcome, ReconcileError> {
        let record = match self.store.get_record(namespace, name).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                debug!(namespace, name, "record gone before reconciliation, skipping");
                return Ok(Outcome::FilteredOut);
            }
            Err(err) => return Err(err.into()),
        };

        if RecordKind::classify(&record) != RecordKind::BuildRequest {
            debug!(namespace, name, "not a build request, ignoring");
            return Ok(Outcome::FilteredOut);
        }
        let request = BuildRequest::new(record);

        info!(
            build = request.name(),
            event_type = request.event_type(),
            provider = request.event_provider(),
            commit = request.commit(),
            "handling build request"
        );

        // Idempotency: a unit named after the request means this event was
        // already handled. Only not-found lets the create path proceed.
        match self.store.get_unit(namespace, name).await {
            Ok(_) => {
                debug!(build = request.name(), "unit already exists, skipping");
                return Ok(Outcome::DuplicateSkip);
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let project_id = request
            .project_id()
            .ok_or_else(|| ReconcileError::MissingProject(request.name().to_string()))?;
        let project = Project::new(self.store.get_record(namespace, project_id).await?);

        let cfg = resolver::resolve(&self.config, &project);
        let spec = builder::build(&request, &cfg, &project)?;

        match self.store.create_unit(spec).await {
            Ok(()) => {
                info!(
                    unit = request.name(),
                    event_type = request.event_type(),
                    commit = request.commit(),
                    at = %Utc::now(),
                    "started execution unit"
                );
                Ok(Outcome::Submitted)
            }
            Err(StoreError::AlreadyExists(_)) => {
                // A concurrent reconciliation won the check-then-create
                // race; one unit exists, which is all that was promised.
                debug!(build = request.name(), "lost creation race, skipping");
                Ok(Outcome::DuplicateSkip)
            }
            Err(err) => Err(err.into()),
        }
    }
}
