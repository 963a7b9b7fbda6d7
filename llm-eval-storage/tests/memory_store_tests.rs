mod common;

use common::*;
use llm_eval_core::*;
use llm_eval_storage::InMemoryStore;
use pretty_assertions::assert_eq;

async fn seeded_store() -> (InMemoryStore, Vec<(DatasetMeta, DatasetConfig)>) {
    let store = InMemoryStore::new();
    let pairs = vec![
        create_test_dataset("GSM8K", "Math"),
        create_test_dataset("MATH", "Math"),
    ];
    for (meta, config) in &pairs {
        store.insert_meta(meta).await.unwrap();
        store.insert_config(config).await.unwrap();
    }
    (store, pairs)
}

#[tokio::test]
async fn test_get_configs_dedupes_and_keeps_request_order() {
    let (store, pairs) = seeded_store().await;
    let a = pairs[0].1.id;
    let b = pairs[1].1.id;

    let loaded = store.get_configs(&[b, a, b, DatasetConfigId::new()]).await.unwrap();
    let ids: Vec<_> = loaded.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![b, a]);
}

#[tokio::test]
async fn test_scheme_membership_editing() {
    let (store, pairs) = seeded_store().await;
    let scheme = Scheme::new("math-suite", None);
    store.insert_scheme(&scheme).await.unwrap();

    store.add_scheme_config(scheme.id, pairs[0].1.id).await.unwrap();
    store.add_scheme_config(scheme.id, pairs[1].1.id).await.unwrap();
    store.add_scheme_config(scheme.id, pairs[0].1.id).await.unwrap();
    assert_eq!(
        store.scheme_config_ids(scheme.id).await.unwrap(),
        vec![pairs[0].1.id, pairs[1].1.id]
    );

    assert!(store.remove_scheme_config(scheme.id, pairs[0].1.id).await.unwrap());
    assert!(!store.remove_scheme_config(scheme.id, pairs[0].1.id).await.unwrap());
    assert_eq!(store.scheme_config_ids(scheme.id).await.unwrap(), vec![pairs[1].1.id]);

    let missing = store.add_scheme_config(SchemeId::new(), pairs[0].1.id).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_update_rejected_once_terminal() {
    let (store, pairs) = seeded_store().await;
    let mut task = create_test_task(vec![pairs[0].1.id]);
    store.create_task(&task, &links_for(&task, &pairs[..1])).await.unwrap();

    task.start().unwrap();
    store.update_task(&task).await.unwrap();
    task.fail("engine crashed").unwrap();
    store.update_task(&task).await.unwrap();

    let mut stale = task.clone();
    stale.status = TaskStatus::Running;
    stale.progress = 50;
    let err = store.update_task(&stale).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));

    let stored = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.error_msg.as_deref(), Some("engine crashed"));
}

#[tokio::test]
async fn test_results_hidden_until_success() {
    let (store, pairs) = seeded_store().await;
    let mut task = create_test_task(vec![pairs[0].1.id]);
    store.create_task(&task, &links_for(&task, &pairs[..1])).await.unwrap();
    task.start().unwrap();
    store.update_task(&task).await.unwrap();

    assert!(store.results_for_task(task.id).await.unwrap().is_empty());

    let results = vec![create_test_result(&task, &pairs[0].1, 0.8)];
    let mut premature = task.clone();
    premature.advance(90).unwrap();
    assert!(store.commit_success(&premature, &results).await.is_err());

    task.succeed(ResultSummary::default()).unwrap();
    store.commit_success(&task, &results).await.unwrap();
    assert_eq!(store.results_for_task(task.id).await.unwrap(), results);
}

#[tokio::test]
async fn test_delete_task_cascades() {
    let (store, pairs) = seeded_store().await;
    let mut task = create_test_task(pairs.iter().map(|(_, c)| c.id).collect());
    store.create_task(&task, &links_for(&task, &pairs)).await.unwrap();
    task.start().unwrap();
    store.update_task(&task).await.unwrap();
    task.succeed(ResultSummary::default()).unwrap();
    let results: Vec<_> = pairs.iter().map(|(_, c)| create_test_result(&task, c, 70.0)).collect();
    store.commit_success(&task, &results).await.unwrap();

    assert_eq!(store.task_links(task.id).await.unwrap().len(), 2);
    assert!(store.delete_task(task.id).await.unwrap());

    assert!(store.get_task(task.id).await.unwrap().is_none());
    assert!(store.task_links(task.id).await.unwrap().is_empty());
    assert!(store.results_for_task(task.id).await.unwrap().is_empty());
    assert!(!store.delete_task(task.id).await.unwrap());
}

#[tokio::test]
async fn test_heartbeat_only_touches_running_tasks() {
    let (store, pairs) = seeded_store().await;
    let mut task = create_test_task(vec![pairs[0].1.id]);
    store.create_task(&task, &[]).await.unwrap();

    assert!(!store.touch_heartbeat(task.id, chrono::Utc::now()).await.unwrap());
    task.start().unwrap();
    store.update_task(&task).await.unwrap();
    assert!(store.touch_heartbeat(task.id, chrono::Utc::now()).await.unwrap());
    assert!(!store.touch_heartbeat(TaskId::new(), chrono::Utc::now()).await.unwrap());
}

#[tokio::test]
async fn test_update_never_rolls_back_heartbeat() {
    let (store, pairs) = seeded_store().await;
    let mut task = create_test_task(vec![pairs[0].1.id]);
    store.create_task(&task, &[]).await.unwrap();
    task.start().unwrap();
    store.update_task(&task).await.unwrap();

    let touched = task.started_at.unwrap() + chrono::Duration::seconds(45);
    assert!(store.touch_heartbeat(task.id, touched).await.unwrap());

    task.advance(90).unwrap();
    store.update_task(&task).await.unwrap();

    let stored = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.progress, 90);
    assert_eq!(stored.heartbeat_at, Some(touched));
    assert_eq!(stored.last_seen(), Some(touched));
}

#[tokio::test]
async fn test_soft_delete_keeps_meta_row() {
    let (store, pairs) = seeded_store().await;
    let meta_id = pairs[0].0.id;

    assert!(store.soft_delete_meta(meta_id).await.unwrap());
    assert!(!store.soft_delete_meta(meta_id).await.unwrap());
    let meta = store.get_meta(meta_id).await.unwrap().unwrap();
    assert!(meta.deleted);
    assert_eq!(store.configs_for_meta(meta_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_tasks_newest_first() {
    let (store, pairs) = seeded_store().await;
    let mut older = create_test_task(vec![pairs[0].1.id]);
    older.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
    let newer = create_test_task(vec![pairs[1].1.id]);
    store.create_task(&older, &[]).await.unwrap();
    store.create_task(&newer, &[]).await.unwrap();

    let ids: Vec<_> = store.list_tasks().await.unwrap().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}
