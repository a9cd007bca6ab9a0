// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory record store.
//!
//! Backs tests and standalone development runs; the production controller
//! is wired to the platform's own record-store client. Behaviour mirrors
//! the platform contract where the reconciler depends on it: name-keyed
//! lookups, `AlreadyExists` on duplicate unit creation, and change
//! notifications with the record kind decided at the watch boundary.

use crate::domain::record::{Record, RecordKind};
use crate::domain::store::{ChangeType, RecordEvent, RecordStore, StoreError};
use crate::domain::unit::ExecutionUnitSpec;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    records: HashMap<(String, String), Record>,
    units: HashMap<(String, String), ExecutionUnitSpec>,
}

/// Concurrency-safe in-memory [`RecordStore`].
#[derive(Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<RecordEvent>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Transport("record store mutex poisoned".to_string()))
    }

    /// Insert or replace a record, notifying watchers.
    pub fn put_record(&self, record: Record) -> Result<(), StoreError> {
        let mut event = RecordEvent {
            kind: RecordKind::classify(&record),
            namespace: record.namespace.clone(),
            name: record.name.clone(),
            change: ChangeType::Added,
        };
        {
            let mut inner = self.lock()?;
            let key = (record.namespace.clone(), record.name.clone());
            if inner.records.insert(key, record).is_some() {
                event.change = ChangeType::Updated;
            }
        }
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(event);
        Ok(())
    }

    /// Remove a record, notifying watchers when one existed.
    pub fn delete_record(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let removed = {
            let mut inner = self.lock()?;
            inner
                .records
                .remove(&(namespace.to_string(), name.to_string()))
        };
        if let Some(record) = removed {
            let _ = self.events.send(RecordEvent {
                kind: RecordKind::classify(&record),
                namespace: namespace.to_string(),
                name: name.to_string(),
                change: ChangeType::Deleted,
            });
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_record(&self, namespace: &str, name: &str) -> Result<Record, StoreError> {
        self.lock()?
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {namespace}/{name}")))
    }

    async fn get_unit(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ExecutionUnitSpec, StoreError> {
        self.lock()?
            .units
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("unit {namespace}/{name}")))
    }

    async fn create_unit(&self, spec: ExecutionUnitSpec) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (spec.namespace.clone(), spec.name.clone());
        if inner.units.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "unit {}/{}",
                spec.namespace, spec.name
            )));
        }
        inner.units.insert(key, spec);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }
}
