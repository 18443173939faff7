mod common;

use common::{Harness, queue, rid};
use edgeflow_core::{
    Binding, ResourceConfig, ResourceDescriptor, ResourceKind, VectorIndexConfig, WorkerConfig,
};
use edgeflow_engine::{FailureCause, NodeOutcome, ProviderError, RemoteResource, RunStatus};
use serde_json::json;

#[tokio::test]
async fn test_existing_remote_is_adopted_not_recreated() {
    let harness = Harness::new("deep-thought", "staging");
    harness.provider(ResourceKind::Queue).add_existing(
        "legacy-queue",
        RemoteResource::new("queue/legacy-queue-0")
            .with_output("id", json!("queue/legacy-queue-0"))
            .with_output("name", json!("legacy-queue")),
    );
    let reconciler = harness.reconciler();

    // 1. adopt有効で既存リモートと同名のキューを宣言
    let q = queue("legacy", "legacy-queue").with_adopt(true);
    let report = reconciler.reconcile(&[q.clone()]).await.unwrap();

    // 検証: 作成ではなく採用になること
    assert!(report.is_success());
    assert_eq!(report.node("legacy").unwrap().outcome, NodeOutcome::Adopted);
    assert_eq!(harness.log.count("create"), 0);
    assert_eq!(harness.log.count("find"), 1);

    let state = harness.backend.committed(&harness.scope).await.unwrap();
    let entry = state.entries.get("legacy").unwrap();
    assert!(entry.adopted);
    assert_eq!(entry.provider_ref, "queue/legacy-queue-0");

    // 2. 再実行: 採用済みエントリは照会し直さずNoOpになる
    let report = reconciler.reconcile(&[q]).await.unwrap();
    assert_eq!(report.node("legacy").unwrap().outcome, NodeOutcome::NoOp);
    assert_eq!(harness.log.count("create"), 0);
    assert_eq!(harness.log.count("find"), 1);
}

#[tokio::test]
async fn test_adoption_conflict_blocks_node_and_dependents() {
    let harness = Harness::new("deep-thought", "staging");
    let index_provider = harness.provider(ResourceKind::VectorIndex);
    index_provider.add_existing(
        "deep-thought-index",
        RemoteResource::new("vector-index/deep-thought-index-0")
            .with_output("dimensions", json!(1536)),
    );
    index_provider.conflict_on(
        "deep-thought-index",
        "dimensions differ: remote 1536, declared 768",
    );
    let reconciler = harness.reconciler();

    let index = ResourceDescriptor::named(
        "index",
        ResourceConfig::VectorIndex(VectorIndexConfig::new("deep-thought-index", 768)),
    )
    .unwrap()
    .with_adopt(true);
    let worker = ResourceDescriptor::named(
        "app-worker",
        ResourceConfig::Worker(
            WorkerConfig::new("deep-thought-worker", "./src/worker.ts")
                .with_binding("SEARCH", Binding::resource(rid("index"))),
        ),
    )
    .unwrap();
    let standalone = queue("jobs", "deep-thought-jobs");

    let report = reconciler
        .reconcile(&[index, worker, standalone])
        .await
        .unwrap();

    // 検証: 衝突したノードは失敗、依存ノードはスキップ、無関係なノードは成功
    assert!(!report.is_success());
    let failed = report.node("index").unwrap();
    assert_eq!(failed.outcome, NodeOutcome::Failed);
    assert!(matches!(
        failed.cause,
        Some(FailureCause::AdoptionConflict { ref reason }) if reason.contains("dimensions")
    ));
    assert_eq!(
        report.node("app-worker").unwrap().outcome,
        NodeOutcome::Skipped
    );
    assert_eq!(report.node("jobs").unwrap().outcome, NodeOutcome::Created);

    match &report.status {
        RunStatus::PartialFailure { failed } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].id, "index");
        }
        RunStatus::Success => panic!("conflict must not converge"),
    }

    // 検証: 衝突ノードはリモートにも状態にも作られないこと
    assert_eq!(harness.log.count("create deep-thought-index"), 0);
    let state = harness.backend.committed(&harness.scope).await.unwrap();
    assert!(!state.entries.contains_key("index"));
    assert!(state.entries.contains_key("jobs"));
}

#[tokio::test]
async fn test_no_lookup_without_adopt_policy() {
    let harness = Harness::new("deep-thought", "staging");
    harness.provider(ResourceKind::Queue).add_existing(
        "deep-thought-jobs",
        RemoteResource::new("queue/deep-thought-jobs-0"),
    );
    let reconciler = harness.reconciler();

    // adopt無効なら既存リモートを探しに行かず、新規作成する
    let report = reconciler
        .reconcile(&[queue("jobs", "deep-thought-jobs")])
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.node("jobs").unwrap().outcome, NodeOutcome::Created);
    assert_eq!(harness.log.count("find"), 0);
    assert_eq!(harness.log.count("create"), 1);
}

#[tokio::test]
async fn test_failed_lookup_blocks_only_that_node() {
    let harness = Harness::new("deep-thought", "staging");
    harness.provider(ResourceKind::Queue).always_fail(
        "find",
        "deep-thought-jobs",
        ProviderError::Api {
            code: 500,
            message: "backend unavailable".to_string(),
        },
    );
    let reconciler = harness.reconciler();

    let flaky = queue("jobs", "deep-thought-jobs").with_adopt(true);
    let healthy = queue("events", "deep-thought-events").with_adopt(true);
    let report = reconciler.reconcile(&[flaky, healthy]).await.unwrap();

    // 検証: 照会に失敗したノードだけが失敗し、他は採用判定を経て作成される
    assert!(!report.is_success());
    let failed = report.node("jobs").unwrap();
    assert_eq!(failed.outcome, NodeOutcome::Failed);
    assert!(matches!(failed.cause, Some(FailureCause::Provider { .. })));
    assert_eq!(report.node("events").unwrap().outcome, NodeOutcome::Created);
}
