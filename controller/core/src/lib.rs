// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Forge Core
//!
//! Reconciliation engine of the Forge build controller: turns one
//! declarative build-request record into exactly one execution unit,
//! merging process-wide defaults with per-project overrides, with
//! at-most-one execution per request name.
//!
//! # Architecture
//!
//! - **domain** — records, the execution-unit model, configuration, and
//!   the record-store capability trait
//! - **application** — config resolver, spec builder, reconciler, and the
//!   controller worker pool
//! - **infrastructure** — the in-memory record store used by tests and
//!   standalone runs

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
