use llm_eval_core::*;
use serde_json::json;

/// A live meta plus one private configuration under it.
pub fn create_test_dataset(name: &str, category: &str) -> (DatasetMeta, DatasetConfig) {
    let meta = DatasetMeta::new(name, category, Modality::Text);
    let config = DatasetConfig::new(
        meta.id,
        format!("{}_gen", name.to_lowercase()),
        TaskShape::FreeForm,
        ExecutionMode::Generative,
        FileReference::Path(format!("/data/{}.jsonl", name.to_lowercase()).into()),
    )
    .with_reader_shape(json!({"input_columns": ["question"], "output_column": "answer"}));
    (meta, config)
}

pub fn create_test_task(config_ids: Vec<DatasetConfigId>) -> EvaluationTask {
    EvaluationTask::new(ModelId::new(), None, config_ids)
}

pub fn links_for(task: &EvaluationTask, pairs: &[(DatasetMeta, DatasetConfig)]) -> Vec<TaskDatasetLink> {
    pairs
        .iter()
        .map(|(meta, config)| {
            TaskDatasetLink::capture(task.id, &ConfigSnapshot::capture(config, meta)).unwrap()
        })
        .collect()
}

pub fn create_test_result(task: &EvaluationTask, config: &DatasetConfig, score: f64) -> EvaluationResult {
    EvaluationResult::new(
        task.id,
        config.id,
        config.name.clone(),
        "accuracy".to_string(),
        score,
        json!({"dataset": config.name, "metric": "accuracy"}),
    )
}
