// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Unit Model
//!
//! The execution unit is the one-shot process group submitted to run a
//! build: one main worker process, an optional source-retrieval pre-step,
//! the volumes they share, and the placement/restart metadata. Its shape is
//! the contract the rest of the platform observes; the constants below are
//! that contract's fixed points.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the main worker process.
pub const MAIN_PROCESS_NAME: &str = "forge-runner";
/// Name of the optional source-retrieval pre-step process.
pub const PRESTEP_PROCESS_NAME: &str = "vcs-prestep";

/// Ephemeral request-scoped volume handing artifacts from the pre-step to
/// the worker.
pub const WORKSPACE_VOLUME: &str = "build-workspace";
/// Volume exposing the build-request record's fields as files.
pub const RECORD_VOLUME: &str = "build-record";

/// Where the worker reads the shared workspace (read-only).
pub const WORKSPACE_MOUNT_PATH: &str = "/vcs";
/// Where the pre-step writes the shared workspace. Namespaced under a
/// sub-directory so partial writes never collide with the worker's view.
pub const PRESTEP_WORKSPACE_MOUNT_PATH: &str = "/vcs/src";
/// Where the worker reads the build-request record's fields as files.
pub const RECORD_MOUNT_PATH: &str = "/etc/forge";

/// Prefix for every synthesized environment variable.
pub const ENV_PREFIX: &str = "FORGE_";

/// Placement selector key constraining the host operating system family.
pub const OS_FAMILY_SELECTOR: &str = "os-family";
/// The single supported host operating system family.
pub const OS_FAMILY_LINUX: &str = "linux";

/// Image pull policies the platform recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    IfNotPresent,
    Always,
    Never,
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PullPolicy::IfNotPresent => "IfNotPresent",
            PullPolicy::Always => "Always",
            PullPolicy::Never => "Never",
        };
        f.write_str(s)
    }
}

/// A pull-policy string outside the recognized set. Surfaced as an
/// invalid-configuration failure, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized pull policy {0:?}")]
pub struct UnrecognizedPullPolicy(pub String);

impl FromStr for PullPolicy {
    type Err = UnrecognizedPullPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IfNotPresent" => Ok(PullPolicy::IfNotPresent),
            "Always" => Ok(PullPolicy::Always),
            "Never" => Ok(PullPolicy::Never),
            other => Err(UnrecognizedPullPolicy(other.to_string())),
        }
    }
}

/// Restart behaviour for the unit as a whole. Builds are one-shot: the
/// controller always submits `Never`, and a failed unit surfaces as a
/// failed record for an external retry policy to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

/// A volume declared on the unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VolumeDecl {
    /// Request-scoped scratch storage, discarded with the unit.
    Ephemeral { name: String },
    /// Backed by a stored record; each field appears as one file.
    RecordBacked { name: String, record: String },
}

impl VolumeDecl {
    pub fn name(&self) -> &str {
        match self {
            VolumeDecl::Ephemeral { name } => name,
            VolumeDecl::RecordBacked { name, .. } => name,
        }
    }
}

/// One mount of a declared volume into a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub volume: String,
    pub path: String,
    pub read_only: bool,
}

/// Where an environment variable's value comes from.
///
/// Reference sources are resolved by the platform at unit start, so a
/// later change to the stored field is reflected without rebuilding the
/// spec. `Literal` is the exception, kept for one compatibility shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum EnvValue {
    /// Inline value, frozen at build time.
    Literal { value: String },
    /// Reference to a field of a stored record.
    RecordField { record: String, field: String },
    /// Reference to the unit's own metadata namespace.
    NamespaceField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: EnvValue,
}

/// Specification of one process inside the unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    pub image: String,
    pub pull_policy: PullPolicy,
    /// Entry command; `None` falls back to the image's built-in entrypoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    pub env: Vec<EnvVar>,
    pub mounts: Vec<VolumeMount>,
}

/// The full execution-unit specification submitted to the record store.
///
/// Constructed fresh per reconciliation, submitted once, then discarded;
/// the unit's own lifecycle is outside this controller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnitSpec {
    /// Unit name, always equal to the build-request name (the idempotency
    /// key).
    pub name: String,
    pub namespace: String,
    /// The build request's labels, verbatim. Downstream observers use
    /// these to correlate unit back to request.
    pub labels: BTreeMap<String, String>,
    /// Service account the unit runs as; empty means platform default.
    pub service_account: String,
    pub main: ProcessSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_step: Option<ProcessSpec>,
    pub volumes: Vec<VolumeDecl>,
    /// Static placement selector; not derived from input.
    pub placement: BTreeMap<String, String>,
    pub restart_policy: RestartPolicy,
}
