// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Record Store Capability
//!
//! Persistence and event-delivery contract the controller consumes. The
//! platform's transport is an external collaborator; the controller only
//! ever sees this trait. An in-memory implementation lives in
//! `crate::infrastructure::memory` for tests and standalone runs.
//!
//! Error classification is deliberately small: `NotFound` drives the
//! create path, `AlreadyExists` is the expected loser of an idempotency
//! race, and everything else is transport for the caller's retry policy.

use crate::domain::record::{Record, RecordKind};
use crate::domain::unit::ExecutionUnitSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Record store failures, classified once at this boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("record store transport failure: {0}")]
    Transport(String),
}

/// Change notification kinds delivered on the watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Updated,
    Deleted,
}

/// One watch notification. The kind is decided at the watch boundary so
/// consumers match on a closed set instead of re-probing labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEvent {
    pub kind: RecordKind,
    pub namespace: String,
    pub name: String,
    pub change: ChangeType,
}

/// Capability interface over the platform record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a stored record by name.
    async fn get_record(&self, namespace: &str, name: &str) -> Result<Record, StoreError>;

    /// Fetch an existing execution unit by name. `NotFound` is the
    /// expected answer on the first reconciliation of a request.
    async fn get_unit(&self, namespace: &str, name: &str)
        -> Result<ExecutionUnitSpec, StoreError>;

    /// Submit a unit for creation. `AlreadyExists` means a concurrent
    /// reconciliation won the race.
    async fn create_unit(&self, spec: ExecutionUnitSpec) -> Result<(), StoreError>;

    /// Subscribe to record change notifications.
    fn subscribe(&self) -> broadcast::Receiver<RecordEvent>;
}
