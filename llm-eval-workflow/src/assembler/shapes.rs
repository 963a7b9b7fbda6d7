use llm_eval_core::{
    evaluator_token, parse_object, reader_declares_columns, DatasetConfig, EvaluatorFamily, ExecutionMode,
    TaskShape,
};
use serde_json::{json, Map, Value};

/// Reader keys only the dataset editor uses.
pub const UI_ONLY_READER_KEYS: &[&str] = &["mapping", "preview", "slots"];

pub const POSTPROCESSOR_KEY: &str = "pred_postprocessor";

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn default_reader(shape: TaskShape) -> Map<String, Value> {
    object(match shape {
        TaskShape::MultipleChoice => json!({
            "input_columns": ["question", "A", "B", "C", "D"],
            "output_column": "answer"
        }),
        TaskShape::Cloze | TaskShape::FreeForm => json!({
            "input_columns": ["question"],
            "output_column": "answer"
        }),
    })
}

fn default_prompt(shape: TaskShape) -> &'static str {
    match shape {
        TaskShape::MultipleChoice => "Question: {question}\nA. {A}\nB. {B}\nC. {C}\nD. {D}\nAnswer:",
        TaskShape::Cloze | TaskShape::FreeForm => "Question: {question}\nAnswer:",
    }
}

pub fn default_infer(shape: TaskShape, mode: ExecutionMode) -> Map<String, Value> {
    let inferencer = match mode {
        ExecutionMode::Perplexity => "PPLInferencer",
        ExecutionMode::Generative | ExecutionMode::Mixed => "GenInferencer",
    };
    object(json!({
        "prompt_template": {
            "type": "PromptTemplate",
            "template": {"round": [{"role": "HUMAN", "prompt": default_prompt(shape)}]}
        },
        "retriever": {"type": "ZeroRetriever"},
        "inferencer": {"type": inferencer}
    }))
}

/// Reader shape with UI-only keys removed, or the default for the task
/// shape when the result does not name its input and output columns.
pub fn reader_cfg(config: &DatasetConfig) -> Map<String, Value> {
    let mut reader = parse_object(config.reader_shape.as_deref()).unwrap_or_default();
    for key in UI_ONLY_READER_KEYS {
        reader.remove(*key);
    }
    if reader.is_empty() {
        tracing::debug!(config_id = %config.id, "Reader shape missing, using default");
        return default_reader(config.task_shape);
    }
    if !reader_declares_columns(&reader) {
        tracing::warn!(
            config_id = %config.id,
            keys = ?reader.keys().collect::<Vec<_>>(),
            "Reader shape lacks input_columns or output_column, using default"
        );
        return default_reader(config.task_shape);
    }
    reader
}

pub fn infer_cfg(config: &DatasetConfig) -> Map<String, Value> {
    let mut infer = parse_object(config.infer_shape.as_deref())
        .unwrap_or_else(|| default_infer(config.task_shape, config.mode));

    if let Some(fewshot) = parse_object(config.fewshot_shape.as_deref()) {
        if let Some(ids) = fewshot.get("fix_id_list").filter(|v| v.is_array()) {
            infer.insert(
                "retriever".to_string(),
                json!({"type": "FixKRetriever", "fix_id_list": ids}),
            );
        }
        if let Some(ice) = fewshot.get("ice_template") {
            infer.insert("ice_template".to_string(), ice.clone());
        }
    }
    infer
}

/// Evaluator shape with a known evaluator family and the post-processor
/// merged in.
pub fn eval_cfg(config: &DatasetConfig) -> Map<String, Value> {
    let mut eval = parse_object(config.metric_shape.as_deref()).unwrap_or_default();

    // Flat `{"type": ..}` shapes describe the evaluator itself.
    if !eval.contains_key("evaluator") {
        if let Some(token) = eval.remove("type") {
            eval.insert("evaluator".to_string(), json!({"type": token}));
        }
    }

    let family = match evaluator_token(&eval) {
        Some(token) => EvaluatorFamily::resolve(&token).unwrap_or_else(|| {
            tracing::warn!(
                config_id = %config.id,
                evaluator = %token,
                "Unknown evaluator, substituting AccEvaluator"
            );
            EvaluatorFamily::Accuracy
        }),
        None => EvaluatorFamily::Accuracy,
    };
    let mut evaluator = eval
        .remove("evaluator")
        .map(object)
        .unwrap_or_default();
    evaluator.insert("type".to_string(), Value::String(family.type_name().to_string()));
    eval.insert("evaluator".to_string(), Value::Object(evaluator));

    if let Some(post) = parse_object(config.postprocess_shape.as_deref()) {
        if post.get("type").and_then(Value::as_str).is_some() {
            eval.insert(POSTPROCESSOR_KEY.to_string(), Value::Object(post));
        }
    }
    eval
}

/// Lower-case slug of a configuration name, safe inside a dataset key.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("dataset");
    }
    out
}
