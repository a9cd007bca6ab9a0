// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Controller Configuration
//!
//! [`ControllerConfig`] holds the process-wide defaults, loaded once at
//! startup and passed explicitly into the reconciler — never read as
//! ambient global state. [`EffectiveConfig`] is the per-reconciliation
//! merge of those defaults with one project's overrides; it is recomputed
//! for every build because the project record may change between builds,
//! and is never persisted.

use crate::domain::unit::PullPolicy;
use serde::{Deserialize, Serialize};

/// Process-wide defaults, immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Namespace this controller watches and submits into.
    pub namespace: String,
    /// Worker image used when a project overrides none of the image triple.
    pub worker_image: String,
    /// Pull policy used when a project supplies no override.
    pub worker_pull_policy: PullPolicy,
    /// Service account units run as; empty means platform default.
    /// Projects cannot override this.
    pub worker_service_account: String,
    /// Optional default worker command, whitespace-tokenized like a
    /// project override.
    pub worker_command: Option<String>,
    /// Number of parallel reconciliation workers.
    pub worker_count: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            worker_image: "100monkeys/forge-worker:latest".to_string(),
            worker_pull_policy: PullPolicy::IfNotPresent,
            worker_service_account: String::new(),
            worker_command: None,
            worker_count: 1,
        }
    }
}

/// The resolved configuration one unit spec is built from.
///
/// The pull policy is carried verbatim as a string: a project override
/// outside the recognized set must surface as an invalid-configuration
/// failure at build time, not be silently replaced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub namespace: String,
    pub worker_image: String,
    pub pull_policy: String,
    pub service_account: String,
    /// Tokenized entry command; `None` falls back to the image entrypoint.
    pub command: Option<Vec<String>>,
}
