// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Config Resolver
//!
//! Merges the process-wide defaults with one project's overrides into the
//! effective worker configuration. Pure and total: a project value wins
//! only where present and non-empty, and nothing in here performs I/O or
//! fails, which keeps the rules testable as plain tables.

use crate::domain::config::{ControllerConfig, EffectiveConfig};
use crate::domain::record::Project;

/// Resolve the effective worker configuration for one build.
///
/// Field rules:
/// - worker image: the project must supply all three of registry, name,
///   and tag for its image to win; a partial override is treated as
///   absent and the default image is used unchanged.
/// - pull policy: a project override is carried verbatim, recognized or
///   not — validation happens when the unit spec is built.
/// - service account: never overridden by the project.
/// - command: project override, else the process-wide default, else none
///   (the image entrypoint); tokenized on whitespace.
pub fn resolve(defaults: &ControllerConfig, project: &Project) -> EffectiveConfig {
    let worker_image = match (
        project.worker_registry(),
        project.worker_name(),
        project.worker_tag(),
    ) {
        (Some(registry), Some(name), Some(tag)) => format!("{registry}/{name}:{tag}"),
        _ => defaults.worker_image.clone(),
    };

    let pull_policy = project
        .worker_pull_policy()
        .map(str::to_string)
        .unwrap_or_else(|| defaults.worker_pull_policy.to_string());

    let command = project
        .worker_command()
        .map(str::to_string)
        .or_else(|| defaults.worker_command.clone())
        .map(|raw| tokenize(&raw))
        .filter(|tokens| !tokens.is_empty());

    EffectiveConfig {
        namespace: defaults.namespace.clone(),
        worker_image,
        pull_policy,
        service_account: defaults.worker_service_account.clone(),
        command,
    }
}

fn tokenize(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
