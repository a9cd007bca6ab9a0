// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Spec Builder
//!
//! Deterministically constructs the full execution-unit specification from
//! a build request and its resolved configuration. Pure: same inputs always
//! yield a structurally identical spec, so every rule here is covered by
//! plain unit tests.
//!
//! The environment-variable allow-list below is a versioned platform
//! contract, not a convenience: downstream workers and compatibility
//! consumers depend on the exact variable set.

use crate::domain::config::EffectiveConfig;
use crate::domain::record::{BuildRequest, Project};
use crate::domain::unit::{
    EnvValue, EnvVar, ExecutionUnitSpec, ProcessSpec, PullPolicy, RestartPolicy,
    UnrecognizedPullPolicy, VolumeDecl, VolumeMount, ENV_PREFIX, MAIN_PROCESS_NAME,
    OS_FAMILY_LINUX, OS_FAMILY_SELECTOR, PRESTEP_PROCESS_NAME, PRESTEP_WORKSPACE_MOUNT_PATH,
    RECORD_MOUNT_PATH, RECORD_VOLUME, WORKSPACE_MOUNT_PATH, WORKSPACE_VOLUME,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::BTreeMap;
use thiserror::Error;

/// Build-request fields synthesized into reference-sourced environment
/// variables, one `FORGE_<UPPERCASED_FIELD>` each. Versioned contract:
/// extend deliberately, never ad hoc.
pub const ENV_FIELD_ALLOW_LIST: [&str; 5] = [
    "event_type",
    "event_provider",
    "commit",
    "project_id",
    "build_id",
];

/// Compatibility shim, isolated here so it can be deleted without touching
/// the general synthesis rule: the worker image does not yet read the
/// script from its mounted record file, so the script also travels inline
/// as a base64 literal.
// TODO remove when forge-worker reads the script mounted at
// RECORD_MOUNT_PATH/script.
const INLINE_SCRIPT_LITERAL: bool = true;

/// Variables synthesized per process: the allow-list references, the
/// namespace reference, and (while the shim lasts) the inline-script
/// literal.
pub const ENV_VAR_COUNT: usize =
    ENV_FIELD_ALLOW_LIST.len() + 1 + INLINE_SCRIPT_LITERAL as usize;

/// Configuration errors surfaced at build time. The resolver carries
/// suspect values verbatim; this is where they are rejected, before any
/// submission happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("build {build}: {source}")]
    UnrecognizedPullPolicy {
        build: String,
        #[source]
        source: UnrecognizedPullPolicy,
    },

    #[error("build {build}: malformed worker image reference {image:?}")]
    MalformedImage { build: String, image: String },
}

/// Construct the execution-unit spec for one build request.
pub fn build(
    request: &BuildRequest,
    cfg: &EffectiveConfig,
    project: &Project,
) -> Result<ExecutionUnitSpec, BuildError> {
    let pull_policy: PullPolicy =
        cfg.pull_policy
            .parse()
            .map_err(|source| BuildError::UnrecognizedPullPolicy {
                build: request.name().to_string(),
                source,
            })?;

    if cfg.worker_image.is_empty() || cfg.worker_image.chars().any(char::is_whitespace) {
        return Err(BuildError::MalformedImage {
            build: request.name().to_string(),
            image: cfg.worker_image.clone(),
        });
    }

    let env = synthesize_env(request);

    let main = ProcessSpec {
        name: MAIN_PROCESS_NAME.to_string(),
        image: cfg.worker_image.clone(),
        pull_policy,
        command: cfg.command.clone(),
        env: env.clone(),
        mounts: vec![
            VolumeMount {
                volume: WORKSPACE_VOLUME.to_string(),
                path: WORKSPACE_MOUNT_PATH.to_string(),
                read_only: true,
            },
            VolumeMount {
                volume: RECORD_VOLUME.to_string(),
                path: RECORD_MOUNT_PATH.to_string(),
                read_only: true,
            },
        ],
    };

    // Pre-step shares the pull policy and environment with the worker; its
    // only extra capability is write access to the shared workspace.
    let pre_step = project.vcs_sidecar().map(|image| ProcessSpec {
        name: PRESTEP_PROCESS_NAME.to_string(),
        image: image.to_string(),
        pull_policy,
        command: None,
        env,
        mounts: vec![VolumeMount {
            volume: WORKSPACE_VOLUME.to_string(),
            path: PRESTEP_WORKSPACE_MOUNT_PATH.to_string(),
            read_only: false,
        }],
    });

    Ok(ExecutionUnitSpec {
        name: request.name().to_string(),
        namespace: request.namespace().to_string(),
        labels: request.labels().clone(),
        service_account: cfg.service_account.clone(),
        main,
        pre_step,
        volumes: vec![
            VolumeDecl::Ephemeral {
                name: WORKSPACE_VOLUME.to_string(),
            },
            VolumeDecl::RecordBacked {
                name: RECORD_VOLUME.to_string(),
                record: request.name().to_string(),
            },
        ],
        placement: BTreeMap::from([(
            OS_FAMILY_SELECTOR.to_string(),
            OS_FAMILY_LINUX.to_string(),
        )]),
        restart_policy: RestartPolicy::Never,
    })
}

/// Synthesize the per-process environment for one request.
///
/// Allow-listed fields are sourced by reference back to the stored record,
/// so a live update to a field is reflected without rebuilding the spec.
/// The namespace variable references the unit's own metadata. The script
/// is the one literal.
fn synthesize_env(request: &BuildRequest) -> Vec<EnvVar> {
    let mut env: Vec<EnvVar> = ENV_FIELD_ALLOW_LIST
        .iter()
        .map(|field| EnvVar {
            name: env_name(field),
            value: EnvValue::RecordField {
                record: request.name().to_string(),
                field: (*field).to_string(),
            },
        })
        .collect();

    env.push(EnvVar {
        name: env_name("namespace"),
        value: EnvValue::NamespaceField,
    });

    if INLINE_SCRIPT_LITERAL {
        env.push(EnvVar {
            name: env_name("script"),
            value: EnvValue::Literal {
                value: BASE64.encode(request.script().unwrap_or_default()),
            },
        });
    }

    env
}

fn env_name(field: &str) -> String {
    format!("{ENV_PREFIX}{}", field.to_ascii_uppercase())
}
