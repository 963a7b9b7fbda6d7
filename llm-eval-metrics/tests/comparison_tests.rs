use chrono::Utc;
use llm_eval_core::{CoreError, SchemeId, TaskId};
use llm_eval_metrics::{ComparedTask, Comparator, ScoreEntry};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn compared(model: &str, scheme: Option<SchemeId>, entries: Vec<ScoreEntry>) -> ComparedTask {
    ComparedTask {
        task_id: TaskId::new(),
        model_name: model.to_string(),
        scheme_id: scheme,
        created_at: Utc::now(),
        entries,
    }
}

#[test]
fn test_diff_against_baseline() {
    let scheme = Some(SchemeId::new());
    let a = compared("base", scheme, vec![ScoreEntry::new("GSM8K", "Math", "Accuracy", 60.0)]);
    let b = compared("tuned", scheme, vec![ScoreEntry::new("GSM8K", "Math", "Accuracy", 75.0)]);

    let report = Comparator::default().compare(&[a.clone(), b.clone()]).unwrap();

    assert_eq!(report.baseline, a.task_id);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].dataset, "GSM8K");
    assert_eq!(report.rows[0].scores, vec![Some(60.0), Some(75.0)]);
    assert_eq!(report.rows[0].diffs, vec![Some(15.0)]);
}

#[test]
fn test_missing_scores_give_null_diffs() {
    let scheme = Some(SchemeId::new());
    let a = compared(
        "a",
        scheme,
        vec![
            ScoreEntry::new("GSM8K", "Math", "accuracy", 60.0),
            ScoreEntry::new("MMLU", "Knowledge", "accuracy", 55.0),
        ],
    );
    let b = compared("b", scheme, vec![ScoreEntry::new("GSM8K", "Math", "accuracy", 58.0)]);
    let c = compared("c", scheme, vec![ScoreEntry::new("HumanEval", "Code", "pass@1", 30.0)]);

    let report = Comparator::default().compare(&[a, b, c]).unwrap();
    let keys: Vec<_> = report.rows.iter().map(|r| r.dataset.as_str()).collect();
    assert_eq!(keys, vec!["GSM8K", "MMLU", "HumanEval"]);

    assert_eq!(report.rows[0].diffs, vec![Some(-2.0), None]);
    assert_eq!(report.rows[1].scores, vec![Some(55.0), None, None]);
    assert_eq!(report.rows[2].diffs, vec![None, None]);
}

#[test]
fn test_radar_series_share_one_axis() {
    let scheme = Some(SchemeId::new());
    let a = compared("a", scheme, vec![ScoreEntry::new("GSM8K", "Math", "accuracy", 0.6)]);
    let b = compared(
        "b",
        scheme,
        vec![
            ScoreEntry::new("GSM8K", "Math", "accuracy", 0.7),
            ScoreEntry::new("HumanEval", "Code", "pass@1", 45.0),
            ScoreEntry::new("WikiText", "Language", "ppl", 8.0),
        ],
    );

    let report = Comparator::default().compare(&[a, b]).unwrap();
    let axis: Vec<_> = report.indicators.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(axis, vec!["Math", "Code"]);
    assert!(report.indicators.iter().all(|i| i.max == 100));
    assert_eq!(report.series[0].values, vec![60.0, 0.0]);
    assert_eq!(report.series[1].values, vec![70.0, 45.0]);
}

#[rstest]
#[case::single_task(1)]
#[case::no_tasks(0)]
fn test_needs_two_tasks(#[case] count: usize) {
    let scheme = Some(SchemeId::new());
    let tasks: Vec<_> = (0..count).map(|_| compared("m", scheme, vec![])).collect();
    assert!(matches!(
        Comparator::default().compare(&tasks),
        Err(CoreError::IncomparableTasks(_))
    ));
}

#[test]
fn test_rejects_mixed_or_missing_schemes() {
    let a = compared("a", Some(SchemeId::new()), vec![]);
    let b = compared("b", Some(SchemeId::new()), vec![]);
    assert!(matches!(
        Comparator::default().compare(&[a.clone(), b]),
        Err(CoreError::IncomparableTasks(_))
    ));

    let no_scheme = compared("c", None, vec![]);
    assert!(matches!(
        Comparator::default().compare(&[a.clone(), no_scheme.clone()]),
        Err(CoreError::IncomparableTasks(_))
    ));
    assert!(matches!(
        Comparator::default().compare(&[no_scheme.clone(), no_scheme]),
        Err(CoreError::IncomparableTasks(_))
    ));
}

#[test]
fn test_rejects_duplicate_task() {
    let a = compared("a", Some(SchemeId::new()), vec![]);
    assert!(matches!(
        Comparator::default().compare(&[a.clone(), a]),
        Err(CoreError::IncomparableTasks(_))
    ));
}
