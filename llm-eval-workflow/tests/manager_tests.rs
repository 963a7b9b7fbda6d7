mod common;

use common::*;
use llm_eval_core::*;
use llm_eval_workflow::{SchemeResolver, TaskManager, TaskRequest};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn manager(fixture: &Fixture) -> (TaskManager, Arc<RecordingSubmitter>) {
    let submitter = Arc::new(RecordingSubmitter::default());
    (TaskManager::new(fixture.dyn_store(), submitter.clone()), submitter)
}

fn explicit(fixture: &Fixture, ids: Vec<DatasetConfigId>) -> TaskRequest {
    TaskRequest {
        model_id: Some(fixture.model.id),
        scheme_id: None,
        config_ids: ids,
    }
}

#[tokio::test]
async fn test_create_persists_pending_task_with_snapshots_and_enqueues() {
    let fixture = Fixture::new(&[("GSM8K", "Math"), ("MMLU", "Knowledge")]).await;
    let (manager, submitter) = manager(&fixture);

    let task = manager.create(explicit(&fixture, fixture.config_ids())).await.unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.progress, 0);
    assert_eq!(task.config_ids, fixture.config_ids());
    assert_eq!(*submitter.submitted.lock().await, vec![task.id]);

    let links = fixture.store.task_links(task.id).await.unwrap();
    let snapshots: Vec<ConfigSnapshot> = links.iter().map(|l| l.decode().unwrap()).collect();
    assert_eq!(snapshots, fixture.snapshots());
}

#[tokio::test]
async fn test_create_requires_known_model() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, submitter) = manager(&fixture);

    let err = manager
        .create(TaskRequest {
            model_id: Some(ModelId::new()),
            scheme_id: None,
            config_ids: fixture.config_ids(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = manager
        .create(TaskRequest {
            model_id: None,
            ..TaskRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(submitter.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn test_create_with_no_ids_fails() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, _) = manager(&fixture);

    let err = manager.create(explicit(&fixture, vec![])).await.unwrap_err();
    assert!(matches!(err, CoreError::NoDatasetsSelected));
}

#[tokio::test]
async fn test_unknown_id_creates_nothing() {
    let fixture = Fixture::new(&[("GSM8K", "Math"), ("MMLU", "Knowledge")]).await;
    let (manager, submitter) = manager(&fixture);

    let mut ids = fixture.config_ids();
    ids.push(DatasetConfigId::new());
    let err = manager.create(explicit(&fixture, ids)).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::PartialOrDuplicateSelection { requested: 3, found: 2 }
    ));
    assert!(fixture.store.list_tasks().await.unwrap().is_empty());
    assert!(submitter.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_id_creates_nothing() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, _) = manager(&fixture);

    let id = fixture.configs[0].id;
    let err = manager.create(explicit(&fixture, vec![id, id])).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::PartialOrDuplicateSelection { requested: 2, found: 1 }
    ));
    assert!(fixture.store.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retired_dataset_cannot_be_selected() {
    let fixture = Fixture::new(&[("GSM8K", "Math"), ("MMLU", "Knowledge")]).await;
    let (manager, _) = manager(&fixture);
    fixture.store.soft_delete_meta(fixture.metas[1].id).await.unwrap();

    let err = manager.create(explicit(&fixture, fixture.config_ids())).await.unwrap_err();
    assert!(matches!(err, CoreError::PartialOrDuplicateSelection { .. }));
}

#[tokio::test]
async fn test_scheme_replaces_explicit_ids() {
    let fixture = Fixture::new(&[("GSM8K", "Math"), ("MMLU", "Knowledge")]).await;
    let (manager, _) = manager(&fixture);
    let scheme = Scheme::new("only-math", None);
    fixture.store.insert_scheme(&scheme).await.unwrap();
    fixture.store.add_scheme_config(scheme.id, fixture.configs[0].id).await.unwrap();

    let task = manager
        .create(TaskRequest {
            model_id: Some(fixture.model.id),
            scheme_id: Some(scheme.id),
            config_ids: vec![fixture.configs[1].id],
        })
        .await
        .unwrap();

    assert_eq!(task.scheme_id, Some(scheme.id));
    assert_eq!(task.config_ids, vec![fixture.configs[0].id]);
}

#[tokio::test]
async fn test_empty_scheme_fails_with_no_datasets_selected() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, _) = manager(&fixture);
    let scheme = Scheme::new("empty", None);
    fixture.store.insert_scheme(&scheme).await.unwrap();

    let resolver = SchemeResolver::new(fixture.dyn_store());
    assert!(matches!(
        resolver.resolve(scheme.id).await.unwrap_err(),
        CoreError::EmptySelection(_)
    ));

    let err = manager
        .create(TaskRequest {
            model_id: Some(fixture.model.id),
            scheme_id: Some(scheme.id),
            config_ids: fixture.config_ids(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoDatasetsSelected));
    assert!(fixture.store.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_scheme_is_not_found() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, _) = manager(&fixture);

    let err = manager
        .create(TaskRequest {
            model_id: Some(fixture.model.id),
            scheme_id: Some(SchemeId::new()),
            config_ids: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_task_keeps_scheme_members_from_creation_time() {
    let fixture = Fixture::new(&[("GSM8K", "Math"), ("MATH", "Math")]).await;
    let (manager, _) = manager(&fixture);
    let scheme = fixture.scheme_with_all("math").await;
    let request = TaskRequest {
        model_id: Some(fixture.model.id),
        scheme_id: Some(scheme.id),
        config_ids: vec![],
    };

    let first = manager.create(request.clone()).await.unwrap();
    fixture
        .store
        .remove_scheme_config(scheme.id, fixture.configs[0].id)
        .await
        .unwrap();
    let second = manager.create(request).await.unwrap();

    let first_links: Vec<_> = fixture
        .store
        .task_links(first.id)
        .await
        .unwrap()
        .iter()
        .map(|l| l.dataset_config_id)
        .collect();
    assert_eq!(first_links, fixture.config_ids());
    assert_eq!(manager.get(first.id).await.unwrap().config_ids, fixture.config_ids());
    assert_eq!(second.config_ids, vec![fixture.configs[1].id]);
}

#[tokio::test]
async fn test_snapshot_survives_config_edits() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, _) = manager(&fixture);
    let task = manager.create(explicit(&fixture, fixture.config_ids())).await.unwrap();

    let mut edited = fixture.configs[0].clone();
    edited.display_metric = "EM".to_string();
    fixture.store.update_config(&edited).await.unwrap();

    let detail = manager.detail(task.id).await.unwrap();
    assert_eq!(detail.datasets[0].config.display_metric, "Accuracy");
    assert_eq!(detail.model_name.as_deref(), Some("demo-model"));
    assert!(detail.results.is_empty());
}

#[tokio::test]
async fn test_delete_cascades_and_is_idempotent() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let workspace_root = tempfile::tempdir().unwrap();
    let submitter = Arc::new(RecordingSubmitter::default());
    let manager = TaskManager::new(fixture.dyn_store(), submitter)
        .with_workspace_cleanup(workspace_root.path());

    let mut task = manager.create(explicit(&fixture, fixture.config_ids())).await.unwrap();
    task.start().unwrap();
    fixture.store.update_task(&task).await.unwrap();
    task.succeed(ResultSummary::default()).unwrap();
    let result = EvaluationResult::new(
        task.id,
        fixture.configs[0].id,
        "gsm8k".to_string(),
        "accuracy".to_string(),
        61.0,
        serde_json::json!({}),
    );
    fixture.store.commit_success(&task, &[result]).await.unwrap();
    assert_eq!(manager.results(task.id).await.unwrap().len(), 1);

    let workspace = workspace_root.path().join(format!("task_{}", task.id));
    std::fs::create_dir_all(&workspace).unwrap();

    assert!(manager.delete(task.id).await.unwrap());
    assert!(!workspace.exists());
    assert!(matches!(manager.get(task.id).await.unwrap_err(), CoreError::NotFound(_)));
    assert!(matches!(manager.results(task.id).await.unwrap_err(), CoreError::NotFound(_)));
    assert!(fixture.store.results_for_task(task.id).await.unwrap().is_empty());
    assert!(fixture.store.task_links(task.id).await.unwrap().is_empty());

    assert!(!manager.delete(task.id).await.unwrap());
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let fixture = Fixture::new(&[("GSM8K", "Math")]).await;
    let (manager, _) = manager(&fixture);

    let older = manager.create(explicit(&fixture, fixture.config_ids())).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = manager.create(explicit(&fixture, fixture.config_ids())).await.unwrap();

    let ids: Vec<_> = manager.list().await.unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}
