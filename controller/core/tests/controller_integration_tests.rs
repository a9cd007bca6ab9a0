// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end controller tests: drive the worker pool over the in-memory
//! record store and assert on the execution units it submits.

use aegis_forge_core::application::builder::ENV_VAR_COUNT;
use aegis_forge_core::application::Controller;
use aegis_forge_core::domain::config::ControllerConfig;
use aegis_forge_core::domain::record::Record;
use aegis_forge_core::domain::store::{RecordStore, StoreError};
use aegis_forge_core::domain::unit::{
    EnvValue, ExecutionUnitSpec, PullPolicy, RestartPolicy, OS_FAMILY_SELECTOR, RECORD_VOLUME,
    WORKSPACE_VOLUME,
};
use aegis_forge_core::infrastructure::InMemoryRecordStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    store: InMemoryRecordStore,
    shutdown: CancellationToken,
    controller: JoinHandle<()>,
}

impl Harness {
    /// Start a controller over a fresh store and give its intake task time
    /// to subscribe before any records are inserted.
    async fn start(config: ControllerConfig) -> Self {
        let store = InMemoryRecordStore::new();
        let shutdown = CancellationToken::new();
        let controller = {
            let store = Arc::new(store.clone());
            let config = Arc::new(config);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                Controller::new(store, config).run(shutdown).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        Self {
            store,
            shutdown,
            controller,
        }
    }

    async fn wait_for_unit(&self, name: &str) -> ExecutionUnitSpec {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            match self.store.get_unit("default", name).await {
                Ok(spec) => return spec,
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(err) => panic!("unit default/{name} never appeared: {err}"),
            }
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.controller.await;
    }
}

fn config() -> ControllerConfig {
    ControllerConfig {
        namespace: "default".to_string(),
        worker_image: "100monkeys/forge-worker:latest".to_string(),
        worker_pull_policy: PullPolicy::IfNotPresent,
        worker_service_account: "my-service-account".to_string(),
        worker_command: None,
        worker_count: 1,
    }
}

fn build_request(name: &str, script: Option<&str>) -> Record {
    let mut data: BTreeMap<String, Vec<u8>> = [
        ("event_type", "push"),
        ("event_provider", "github"),
        ("commit", "9c75584"),
        ("project_id", "ahab"),
        ("build_id", "queequeg"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
    .collect();
    if let Some(script) = script {
        data.insert("script".to_string(), script.as_bytes().to_vec());
    }
    Record {
        name: name.to_string(),
        namespace: "default".to_string(),
        labels: [
            ("heritage", "forge"),
            ("component", "build"),
            ("project", "ahab"),
            ("build", "queequeg"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
        data,
    }
}

fn project(name: &str, fields: &[(&str, &str)]) -> Record {
    Record {
        name: name.to_string(),
        namespace: "default".to_string(),
        labels: [("heritage", "forge"), ("component", "project")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        data: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect(),
    }
}

#[tokio::test]
async fn sidecar_project_yields_unit_with_prestep() {
    let harness = Harness::start(config()).await;
    let request = build_request("moby", None);

    harness.store.put_record(project("ahab", &[("vcs_sidecar", "fake/sidecar:latest")])).unwrap();
    harness.store.put_record(request.clone()).unwrap();

    let unit = harness.wait_for_unit("moby").await;

    assert_eq!(unit.name, "moby");
    assert_eq!(unit.labels, request.labels);
    assert_eq!(unit.service_account, "my-service-account");
    assert_eq!(unit.restart_policy, RestartPolicy::Never);
    assert_eq!(
        unit.placement.get(OS_FAMILY_SELECTOR).map(String::as_str),
        Some("linux")
    );

    assert_eq!(unit.volumes.len(), 2);
    assert_eq!(unit.volumes[0].name(), WORKSPACE_VOLUME);
    assert_eq!(unit.volumes[1].name(), RECORD_VOLUME);

    assert_eq!(unit.main.name, "forge-runner");
    assert_eq!(unit.main.image, "100monkeys/forge-worker:latest");
    assert_eq!(unit.main.pull_policy, PullPolicy::IfNotPresent);
    assert_eq!(unit.main.command, None);
    assert_eq!(unit.main.env.len(), ENV_VAR_COUNT);
    assert_eq!(unit.main.mounts[0].volume, WORKSPACE_VOLUME);

    let prestep = unit.pre_step.expect("expected one pre-step process");
    assert_eq!(prestep.image, "fake/sidecar:latest");
    assert_eq!(prestep.pull_policy, unit.main.pull_policy);
    assert_eq!(prestep.env.len(), ENV_VAR_COUNT);
    assert_eq!(prestep.mounts[0].volume, WORKSPACE_VOLUME);

    harness.stop().await;
}

#[tokio::test]
async fn inline_script_is_carried_as_literal_without_prestep_difference() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project("ahab", &[("vcs_sidecar", "fake/sidecar:latest")])).unwrap();
    harness.store.put_record(build_request("moby", Some("hello"))).unwrap();

    let unit = harness.wait_for_unit("moby").await;

    let script = unit
        .main
        .env
        .iter()
        .find(|var| var.name == "FORGE_SCRIPT")
        .expect("script variable missing");
    assert_eq!(
        script.value,
        EnvValue::Literal {
            value: "aGVsbG8=".to_string()
        }
    );
    assert_eq!(unit.main.env.len(), ENV_VAR_COUNT);
    assert!(unit.pre_step.is_some());

    harness.stop().await;
}

#[tokio::test]
async fn plain_project_yields_unit_without_prestep() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project("ahab", &[])).unwrap();
    harness.store.put_record(build_request("moby", None)).unwrap();

    let unit = harness.wait_for_unit("moby").await;
    assert!(unit.pre_step.is_none());
    assert_eq!(unit.main.image, "100monkeys/forge-worker:latest");

    harness.stop().await;
}

#[tokio::test]
async fn project_worker_command_overrides_entry_command() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project(
        "ahab",
        &[
            ("vcs_sidecar", "fake/sidecar:latest"),
            ("worker_command", "worker command"),
        ],
    )).unwrap();
    harness.store.put_record(build_request("moby", Some("hello"))).unwrap();

    let unit = harness.wait_for_unit("moby").await;
    assert_eq!(
        unit.main.command,
        Some(vec!["worker".to_string(), "command".to_string()])
    );

    harness.stop().await;
}

#[tokio::test]
async fn project_specific_worker_config_wins() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project(
        "ahab",
        &[
            ("vcs_sidecar", "fake/sidecar:latest"),
            ("worker_registry", "myrepo"),
            ("worker_name", "forge-worker-with-deps"),
            ("worker_tag", "canary"),
            ("worker_pull_policy", "Always"),
        ],
    )).unwrap();
    let request = build_request("moby", None);
    harness.store.put_record(request.clone()).unwrap();

    let unit = harness.wait_for_unit("moby").await;

    assert_eq!(unit.labels, request.labels);
    assert_eq!(unit.main.image, "myrepo/forge-worker-with-deps:canary");
    assert_eq!(unit.main.pull_policy, PullPolicy::Always);
    assert_eq!(unit.main.env.len(), ENV_VAR_COUNT);

    let prestep = unit.pre_step.expect("expected one pre-step process");
    assert_eq!(prestep.image, "fake/sidecar:latest");
    assert_eq!(prestep.pull_policy, PullPolicy::Always);

    harness.stop().await;
}

#[tokio::test]
async fn unrecognized_pull_policy_submits_nothing() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project(
        "ahab",
        &[
            ("worker_registry", "myrepo"),
            ("worker_name", "forge-worker-with-deps"),
            ("worker_tag", "canary"),
            ("worker_pull_policy", "Sometimes"),
        ],
    )).unwrap();
    harness.store.put_record(build_request("moby", None)).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(
        harness.store.get_unit("default", "moby").await,
        Err(StoreError::NotFound(_))
    ));

    harness.stop().await;
}

#[tokio::test]
async fn redelivery_of_the_same_request_creates_no_second_unit() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project("ahab", &[])).unwrap();
    let request = build_request("moby", None);
    harness.store.put_record(request.clone()).unwrap();
    let first = harness.wait_for_unit("moby").await;

    // Redeliver: an update event re-queues the same name.
    harness.store.put_record(request).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let second = harness.store.get_unit("default", "moby").await.unwrap();
    assert_eq!(first, second);

    harness.stop().await;
}

#[tokio::test]
async fn racing_reconcilers_produce_one_unit_and_one_skip() {
    use aegis_forge_core::application::{Outcome, Reconciler};

    let store = Arc::new(InMemoryRecordStore::new());
    store.put_record(project("ahab", &[])).unwrap();
    store.put_record(build_request("moby", None)).unwrap();

    let cfg = Arc::new(config());
    let left = Reconciler::new(store.clone() as Arc<dyn RecordStore>, cfg.clone());
    let right = Reconciler::new(store.clone() as Arc<dyn RecordStore>, cfg);

    let (a, b) = tokio::join!(
        left.reconcile("default", "moby"),
        right.reconcile("default", "moby")
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Submitted).count(),
        1
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::DuplicateSkip).count(),
        1
    );
    assert!(store.get_unit("default", "moby").await.is_ok());
}

#[tokio::test]
async fn project_record_events_trigger_no_submission() {
    let harness = Harness::start(config()).await;

    harness.store.put_record(project("ahab", &[])).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(matches!(
        harness.store.get_unit("default", "ahab").await,
        Err(StoreError::NotFound(_))
    ));

    harness.stop().await;
}
