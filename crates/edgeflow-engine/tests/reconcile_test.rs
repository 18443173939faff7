mod common;

use common::{Harness, queue, rid};
use edgeflow_core::{
    AiConfig, Binding, CommentConfig, DistanceMetric, DomainConfig, EventSourceConfig, QueueConfig,
    ResourceConfig, ResourceDescriptor, Template, VectorIndexConfig, WorkerConfig,
};
use edgeflow_engine::{ActionKind, NodeOutcome};

#[tokio::test]
async fn test_create_then_converge_then_garbage_collect() {
    let harness = Harness::new("deep-thought", "staging");
    let reconciler = harness.reconciler();

    // 1. 初回デプロイ: キューとWorkerを作成
    let q = queue("app-queue", "deep-thought-queue").with_delete(true);
    let worker = ResourceDescriptor::named(
        "app-worker",
        ResourceConfig::Worker(
            WorkerConfig::new("deep-thought-worker", "./src/worker.ts")
                .with_binding("JOBS", Binding::resource(rid("app-queue"))),
        ),
    )
    .unwrap()
    .with_delete(true);

    let report = reconciler
        .reconcile(&[q.clone(), worker.clone()])
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.nodes_with(NodeOutcome::Created).len(), 2);
    assert_eq!(
        harness.log.entries(),
        vec!["create deep-thought-queue", "create deep-thought-worker"]
    );

    // 検証: 状態ストアに両エントリが記録されていること
    let state = harness.backend.committed(&harness.scope).await.unwrap();
    assert_eq!(state.entries.len(), 2);
    assert!(state.entries.contains_key("app-queue"));
    assert!(state.entries.contains_key("app-worker"));

    // 2. 再実行: 宣言が変わらなければプロバイダーに触れない
    harness.log.clear();
    let report = reconciler
        .reconcile(&[q.clone(), worker.clone()])
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.nodes_with(NodeOutcome::NoOp).len(), 2);
    assert_eq!(harness.log.count("create"), 0);
    assert_eq!(harness.log.count("update"), 0);

    // 3. Workerを宣言から外す: deleteポリシーに従って削除される
    harness.log.clear();
    let report = reconciler.reconcile(&[q.clone()]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.nodes_with(NodeOutcome::Deleted).len(), 1);
    assert_eq!(harness.log.entries(), vec!["delete deep-thought-worker"]);

    // 検証: ストアからも消えていること
    let state = harness.backend.committed(&harness.scope).await.unwrap();
    assert!(!state.entries.contains_key("app-worker"));
    assert!(state.entries.contains_key("app-queue"));
}

#[tokio::test]
async fn test_second_run_leaves_state_unchanged() {
    let harness = Harness::new("deep-thought", "staging");
    let reconciler = harness.reconciler();
    let descriptors = vec![
        queue("ingest", "deep-thought-ingest"),
        ResourceDescriptor::named(
            "index",
            ResourceConfig::VectorIndex(VectorIndexConfig::new("deep-thought-index", 768)),
        )
        .unwrap(),
    ];

    // 1. 初回実行
    reconciler.reconcile(&descriptors).await.unwrap();
    let first = harness.backend.committed(&harness.scope).await.unwrap();

    // 2. 同じ宣言で再実行
    let report = reconciler.reconcile(&descriptors).await.unwrap();
    let second = harness.backend.committed(&harness.scope).await.unwrap();

    // 検証: 全ノードがNoOpで、状態エントリが前回と一致すること
    assert!(report.is_success());
    assert!(
        report
            .nodes
            .iter()
            .all(|node| node.outcome == NodeOutcome::NoOp)
    );
    assert_eq!(first.entries, second.entries);
}

#[tokio::test]
async fn test_config_change_updates_in_place() {
    let harness = Harness::new("deep-thought", "staging");
    let reconciler = harness.reconciler();

    // 1. 配信遅延なしで作成
    reconciler
        .reconcile(&[queue("jobs", "deep-thought-jobs")])
        .await
        .unwrap();
    let state = harness.backend.committed(&harness.scope).await.unwrap();
    let created = state.entries.get("jobs").unwrap().clone();

    // 2. 配信遅延を追加して再実行
    let changed = ResourceDescriptor::named(
        "jobs",
        ResourceConfig::Queue(QueueConfig::new("deep-thought-jobs").with_delivery_delay_secs(30)),
    )
    .unwrap();
    let report = reconciler.reconcile(&[changed]).await.unwrap();

    // 検証: 更新として実行され、リモート参照と作成時刻は引き継がれること
    assert!(report.is_success());
    assert_eq!(report.nodes_with(NodeOutcome::Updated).len(), 1);
    let state = harness.backend.committed(&harness.scope).await.unwrap();
    let updated = state.entries.get("jobs").unwrap();
    assert_eq!(updated.provider_ref, created.provider_ref);
    assert_eq!(updated.created_at, created.created_at);
    assert_ne!(updated.fingerprint, created.fingerprint);
    assert_eq!(harness.log.count("create"), 1);
    assert_eq!(harness.log.count("update"), 1);
}

#[tokio::test]
async fn test_outputs_flow_into_dependents() {
    let harness = Harness::new("deep-thought", "staging");
    let reconciler = harness.reconciler();

    // 宣言順を入れ替えても依存順で適用される
    let comment = ResourceDescriptor::named(
        "deploy-comment",
        ResourceConfig::Comment(CommentConfig::new(
            "chronista-club",
            "deep-thought",
            42,
            Template::parse("Deployed to ${app-worker.url}").unwrap(),
        )),
    )
    .unwrap();
    let worker = ResourceDescriptor::named(
        "app-worker",
        ResourceConfig::Worker(
            WorkerConfig::new("deep-thought-worker", "./src/worker.ts")
                .with_binding("JOBS", Binding::resource(rid("app-queue")))
                .with_url(true),
        ),
    )
    .unwrap();
    let q = queue("app-queue", "deep-thought-queue");

    let report = reconciler.reconcile(&[comment, worker, q]).await.unwrap();

    // 検証: キュー → Worker → コメントの順に作成されること
    assert!(report.is_success());
    assert_eq!(
        harness.log.entries(),
        vec![
            "create deep-thought-queue",
            "create deep-thought-worker",
            "create comment"
        ]
    );

    // 検証: コメント本文にWorkerのURLが展開されていること
    let outputs = report.outputs("deploy-comment").unwrap();
    assert_eq!(
        outputs["body"],
        "Deployed to https://deep-thought-worker.example-edge.dev"
    );
}

#[tokio::test]
async fn test_plan_is_a_pure_preview() {
    let harness = Harness::new("deep-thought", "staging");
    let reconciler = harness.reconciler();
    let descriptors = vec![queue("jobs", "deep-thought-jobs")];

    // 1. プランのみ実行
    let plan = reconciler.plan(&descriptors).await.unwrap();
    assert!(plan.has_changes());
    assert!(matches!(
        plan.action(&rid("jobs")).unwrap().action,
        ActionKind::Create
    ));
    assert_eq!(
        format!("{}", plan.summary()),
        "1 to create, 0 to adopt, 0 to update, 0 to delete, 0 unchanged"
    );

    // 検証: プロバイダー呼び出しも状態書き込みも発生しないこと
    assert_eq!(harness.log.entries(), Vec::<String>::new());
    assert!(harness.backend.committed(&harness.scope).await.is_none());

    // 2. 適用後のプランは変更なしになる
    reconciler.reconcile(&descriptors).await.unwrap();
    let plan = reconciler.plan(&descriptors).await.unwrap();
    assert!(!plan.has_changes());
}

#[tokio::test]
async fn test_full_stack_deployment() -> anyhow::Result<()> {
    let harness = Harness::new("deep-thought", "staging");
    let reconciler = harness.reconciler();

    let descriptors = vec![
        queue("jobs", "deep-thought-jobs"),
        ResourceDescriptor::named(
            "index",
            ResourceConfig::VectorIndex(
                VectorIndexConfig::new("deep-thought-index", 768)
                    .with_metric(DistanceMetric::Cosine),
            ),
        )?,
        ResourceDescriptor::named("ai", ResourceConfig::Ai(AiConfig::new()))?,
        ResourceDescriptor::named(
            "app-worker",
            ResourceConfig::Worker(
                WorkerConfig::new("deep-thought-worker", "./src/worker.ts")
                    .with_compatibility_date("2025-04-26")
                    .with_binding("JOBS", Binding::resource(rid("jobs")))
                    .with_binding("SEARCH", Binding::resource(rid("index")))
                    .with_binding("AI", Binding::resource(rid("ai")))
                    .with_binding("STAGE", Binding::plain("staging"))
                    .with_observability(true)
                    .with_url(true),
            ),
        )?,
        ResourceDescriptor::named(
            "api-domain",
            ResourceConfig::Domain(DomainConfig::new(
                "api.deep-thought.example",
                "zone-1",
                rid("app-worker"),
            )),
        )?,
        ResourceDescriptor::named(
            "jobs-consumer",
            ResourceConfig::EventSource(
                EventSourceConfig::new(rid("app-worker"), rid("jobs")).with_batch_size(25),
            ),
        )?,
        ResourceDescriptor::named(
            "deploy-comment",
            ResourceConfig::Comment(CommentConfig::new(
                "chronista-club",
                "deep-thought",
                7,
                Template::parse(
                    "API at https://${api-domain.hostname} (worker ${app-worker.url})",
                )?,
            )),
        )?,
    ];

    let report = reconciler.reconcile(&descriptors).await?;

    // 検証: 7種別すべてが一度の実行で収束すること
    assert!(report.is_success());
    assert_eq!(report.nodes_with(NodeOutcome::Created).len(), 7);
    assert_eq!(
        format!("{}", report.summary()),
        "7 created, 0 adopted, 0 updated, 0 unchanged, 0 deleted, 0 retained, 0 failed, 0 skipped"
    );

    let state = harness.backend.committed(&harness.scope).await.unwrap();
    assert_eq!(state.entries.len(), 7);
    Ok(())
}
