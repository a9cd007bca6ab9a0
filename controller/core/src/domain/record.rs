// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Record Model — Build Requests and Projects
//!
//! The controller observes two record kinds on the platform record store:
//!
//! | Kind | Labels | Role |
//! |------|--------|------|
//! | `BuildRequest` | `heritage=forge`, `component=build` | read-only trigger, one per build |
//! | `Project` | `heritage=forge`, `component=project` | per-project configuration overrides |
//!
//! Records are opaque key→byte-blob maps with a label set. `BuildRequest`
//! and `Project` are typed views over a [`Record`]; kind classification
//! happens once, at the watch boundary, so downstream code matches on the
//! closed [`RecordKind`] set instead of probing labels ad hoc.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label key identifying the owning system.
pub const LABEL_HERITAGE: &str = "heritage";
/// Label key identifying the record's component kind.
pub const LABEL_COMPONENT: &str = "component";
/// Label key carrying the project identifier on a build request.
pub const LABEL_PROJECT: &str = "project";
/// Label key carrying the build identifier on a build request.
pub const LABEL_BUILD: &str = "build";

/// Heritage value stamped on every record this controller owns.
pub const HERITAGE_FORGE: &str = "forge";
/// Component value marking a record as a build request.
pub const COMPONENT_BUILD: &str = "build";
/// Component value marking a record as a project.
pub const COMPONENT_PROJECT: &str = "project";

/// An opaque record as stored by the platform record store.
///
/// The name is unique within a namespace and doubles as the execution-unit
/// name, which is what makes reconciliation idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Arbitrary key→byte-blob fields.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Record {
    fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// A data field decoded as UTF-8, `None` when absent, empty, or not
    /// valid UTF-8. Configuration fields that fail this test are treated
    /// as absent rather than rejected.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .filter(|s| !s.is_empty())
    }
}

/// Closed classification of observed records, decided once at the watch
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    BuildRequest,
    Project,
    Other,
}

impl RecordKind {
    /// Classify a record by its label set.
    ///
    /// Records without the forge heritage label are never ours, whatever
    /// their component label claims.
    pub fn classify(record: &Record) -> Self {
        if record.label(LABEL_HERITAGE) != Some(HERITAGE_FORGE) {
            return RecordKind::Other;
        }
        match record.label(LABEL_COMPONENT) {
            Some(COMPONENT_BUILD) => RecordKind::BuildRequest,
            Some(COMPONENT_PROJECT) => RecordKind::Project,
            _ => RecordKind::Other,
        }
    }
}

/// Typed view over a build-request record.
///
/// Immutable once observed; the controller only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    record: Record,
}

impl BuildRequest {
    pub fn new(record: Record) -> Self {
        Self { record }
    }

    /// The record name, reused verbatim as the execution-unit name.
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn namespace(&self) -> &str {
        &self.record.namespace
    }

    /// The full label set, copied verbatim onto the execution unit.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.record.labels
    }

    pub fn event_type(&self) -> &str {
        self.record.field_str("event_type").unwrap_or_default()
    }

    pub fn event_provider(&self) -> &str {
        self.record.field_str("event_provider").unwrap_or_default()
    }

    pub fn commit(&self) -> &str {
        self.record.field_str("commit").unwrap_or_default()
    }

    /// The owning project's identifier, from the `project_id` field with
    /// the `project` label as fallback.
    pub fn project_id(&self) -> Option<&str> {
        self.record
            .field_str("project_id")
            .or_else(|| self.record.label(LABEL_PROJECT))
            .filter(|s| !s.is_empty())
    }

    /// The optional inline build script, raw bytes.
    pub fn script(&self) -> Option<&[u8]> {
        self.record.data.get("script").map(Vec::as_slice)
    }
}

/// Typed view over a project record.
///
/// Every accessor returns `None` when the underlying field is absent or
/// empty, which the resolver reads as "use the process-wide default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    record: Record,
}

impl Project {
    pub fn new(record: Record) -> Self {
        Self { record }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Image for the source-retrieval pre-step, when the project wants one.
    pub fn vcs_sidecar(&self) -> Option<&str> {
        self.record.field_str("vcs_sidecar")
    }

    pub fn worker_registry(&self) -> Option<&str> {
        self.record.field_str("worker_registry")
    }

    pub fn worker_name(&self) -> Option<&str> {
        self.record.field_str("worker_name")
    }

    pub fn worker_tag(&self) -> Option<&str> {
        self.record.field_str("worker_tag")
    }

    /// Pull-policy override, carried verbatim; validated when the unit
    /// spec is built, not here.
    pub fn worker_pull_policy(&self) -> Option<&str> {
        self.record.field_str("worker_pull_policy")
    }

    /// Explicit worker command override, whitespace-tokenized downstream.
    pub fn worker_command(&self) -> Option<&str> {
        self.record.field_str("worker_command")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(pairs: &[(&str, &str)]) -> Record {
        Record {
            name: "moby".to_string(),
            namespace: "default".to_string(),
            labels: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn classify_build_request() {
        let record = labelled(&[("heritage", "forge"), ("component", "build")]);
        assert_eq!(RecordKind::classify(&record), RecordKind::BuildRequest);
    }

    #[test]
    fn classify_project() {
        let record = labelled(&[("heritage", "forge"), ("component", "project")]);
        assert_eq!(RecordKind::classify(&record), RecordKind::Project);
    }

    #[test]
    fn classify_foreign_heritage_is_other() {
        let record = labelled(&[("heritage", "someone-else"), ("component", "build")]);
        assert_eq!(RecordKind::classify(&record), RecordKind::Other);
    }

    #[test]
    fn classify_unlabelled_is_other() {
        let record = labelled(&[]);
        assert_eq!(RecordKind::classify(&record), RecordKind::Other);
    }

    #[test]
    fn empty_fields_read_as_absent() {
        let mut record = labelled(&[("heritage", "forge"), ("component", "project")]);
        record.data.insert("vcs_sidecar".to_string(), Vec::new());
        record
            .data
            .insert("worker_registry".to_string(), vec![0xff, 0xfe]);
        let project = Project::new(record);
        assert_eq!(project.vcs_sidecar(), None);
        assert_eq!(project.worker_registry(), None);
    }

    #[test]
    fn project_id_falls_back_to_label() {
        let record = labelled(&[
            ("heritage", "forge"),
            ("component", "build"),
            ("project", "ahab"),
        ]);
        let request = BuildRequest::new(record.clone());
        assert_eq!(request.project_id(), Some("ahab"));

        let mut with_field = record;
        with_field
            .data
            .insert("project_id".to_string(), b"pequod".to_vec());
        let request = BuildRequest::new(with_field);
        assert_eq!(request.project_id(), Some("pequod"));
    }
}
