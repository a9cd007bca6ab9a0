// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod record;
pub mod unit;
pub mod config;
pub mod store;

pub use record::{BuildRequest, Project, Record, RecordKind};
pub use store::{ChangeType, RecordEvent, RecordStore, StoreError};
