mod common;

use chrono::{Duration, Utc};
use common::*;
use llm_eval_core::*;
use llm_eval_workflow::{DatasetRetirer, OrchestratorConfig, Reconciler, SummaryExporter};
use pretty_assertions::assert_eq;
use std::io::Read;

#[tokio::test]
async fn test_reconciler_fails_only_stale_running_tasks() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let now = Utc::now();

    let mut stale = fixture.pending_task(None).await;
    stale.start().unwrap();
    stale.heartbeat_at = Some(now - Duration::minutes(30));
    fixture.store.update_task(&stale).await.unwrap();

    let mut alive = fixture.pending_task(None).await;
    alive.start().unwrap();
    fixture.store.update_task(&alive).await.unwrap();
    assert!(fixture.store.touch_heartbeat(alive.id, now).await.unwrap());

    let pending = fixture.pending_task(None).await;

    let reconciler = Reconciler::new(fixture.dyn_store(), Duration::minutes(10));
    let failed = reconciler.reconcile_once(now).await.unwrap();

    assert_eq!(failed, vec![stale.id]);
    let stale = fixture.store.get_task(stale.id).await.unwrap().unwrap();
    assert_eq!(stale.status, TaskStatus::Failed);
    assert!(stale.error_msg.unwrap().contains("heartbeat"));
    assert_eq!(
        fixture.store.get_task(alive.id).await.unwrap().unwrap().status,
        TaskStatus::Running
    );
    assert_eq!(
        fixture.store.get_task(pending.id).await.unwrap().unwrap().status,
        TaskStatus::Pending
    );

    assert!(reconciler.reconcile_once(now).await.unwrap().is_empty());
    assert!(!fixture.store.touch_heartbeat(stale.id, now).await.unwrap());
}

#[tokio::test]
async fn test_export_packs_summary_and_tables() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let root = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig::default().with_workspace_root(root.path().join("tasks"));

    let mut task = fixture.pending_task(None).await;
    let exporter = SummaryExporter::new(fixture.dyn_store(), config.clone());
    assert!(matches!(
        exporter.export(task.id, root.path()).await.unwrap_err(),
        CoreError::InvalidState(_)
    ));

    task.start().unwrap();
    fixture.store.update_task(&task).await.unwrap();
    task.succeed(ResultSummary::default()).unwrap();
    fixture.store.commit_success(&task, &[]).await.unwrap();

    let workspace = config.task_workspace(task.id);
    let table = summary_csv("demo-model", &[("gsm8k", "accuracy", "61")]);
    write_summary(&workspace, "20240101_000000", "summary_20240101_000000.csv", &table);

    let archive = exporter.export(task.id, &root.path().join("out")).await.unwrap();

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "20240101_000000/summary/summary_20240101_000000.csv".to_string(),
            "result_summary.json".to_string(),
        ]
    );

    let mut body = String::new();
    zip.by_name("20240101_000000/summary/summary_20240101_000000.csv")
        .unwrap()
        .read_to_string(&mut body)
        .unwrap();
    assert_eq!(body, table);

    let mut summary = String::new();
    zip.by_name("result_summary.json")
        .unwrap()
        .read_to_string(&mut summary)
        .unwrap();
    let summary: ResultSummary = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary, task.summary.unwrap());
}

#[tokio::test]
async fn test_retiring_dataset_removes_files_but_keeps_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(&[]).await;
    let meta = DatasetMeta::new("Custom", "Reasoning", Modality::Text);
    let file = dir.path().join("custom.jsonl");
    std::fs::write(&file, "{\"question\": \"1+1\", \"answer\": \"2\"}\n").unwrap();
    let config = DatasetConfig::new(
        meta.id,
        "custom",
        TaskShape::FreeForm,
        ExecutionMode::Generative,
        FileReference::Path(file.clone()),
    );
    fixture.store.insert_meta(&meta).await.unwrap();
    fixture.store.insert_config(&config).await.unwrap();

    let task = EvaluationTask::new(fixture.model.id, None, vec![config.id]);
    let link = TaskDatasetLink::capture(task.id, &ConfigSnapshot::capture(&config, &meta)).unwrap();
    fixture.store.create_task(&task, &[link]).await.unwrap();

    let retirer = DatasetRetirer::new(fixture.dyn_store());
    let report = retirer.retire(meta.id).await.unwrap();

    assert_eq!(report.removed_files, vec![file.clone()]);
    assert!(!file.exists());
    assert!(fixture.store.get_meta(meta.id).await.unwrap().unwrap().deleted);
    let links = fixture.store.task_links(task.id).await.unwrap();
    assert_eq!(links[0].decode().unwrap().config, config);

    assert!(matches!(
        retirer.retire(meta.id).await.unwrap_err(),
        CoreError::NotFound(_)
    ));
}
