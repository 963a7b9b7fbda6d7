use approx::assert_relative_eq;
use llm_eval_metrics::{CategoryAggregator, ScoreEntry, ScoreNormalizer};
use pretty_assertions::assert_eq;

// ===== Radar Tests =====

#[test]
fn test_mixed_scales_average_within_category() {
    let entries = vec![
        ScoreEntry::new("GSM8K", "Math", "accuracy", 0.8),
        ScoreEntry::new("MATH", "Math", "accuracy", 90.0),
    ];
    let radar = CategoryAggregator::default().radar(&entries);

    assert_eq!(radar.len(), 1);
    assert_eq!(radar[0].name, "Math");
    assert_eq!(radar[0].max, 100);
    assert_relative_eq!(radar[0].score, 85.0, epsilon = 1e-9);
}

#[test]
fn test_perplexity_never_reaches_radar() {
    let entries = vec![
        ScoreEntry::new("WikiText", "Language", "ppl", 0.5),
        ScoreEntry::new("LAMBADA", "Language", "accuracy", 70.0),
        ScoreEntry::new("Pile", "Modeling", "PPL", 12.3),
    ];
    let summary = CategoryAggregator::default().summarize(&entries);

    assert_eq!(summary.radar.len(), 1);
    assert_eq!(summary.radar[0].name, "Language");
    assert_relative_eq!(summary.radar[0].score, 70.0, epsilon = 1e-9);

    // Table keeps every row verbatim.
    assert_eq!(summary.table.len(), 3);
    assert_eq!(summary.table[0].metric, "ppl");
    assert_relative_eq!(summary.table[0].score, 0.5, epsilon = 1e-9);
    assert_relative_eq!(summary.table[2].score, 12.3, epsilon = 1e-9);
}

#[test]
fn test_each_score_capped_before_averaging() {
    let entries = vec![
        ScoreEntry::new("A", "Code", "pass@1", 150.0),
        ScoreEntry::new("B", "Code", "pass@1", 50.0),
    ];
    let radar = CategoryAggregator::default().radar(&entries);
    assert_relative_eq!(radar[0].score, 75.0, epsilon = 1e-9);
}

#[test]
fn test_categories_in_first_seen_order() {
    let entries = vec![
        ScoreEntry::new("HumanEval", "Code", "pass@1", 40.0),
        ScoreEntry::new("GSM8K", "Math", "accuracy", 60.0),
        ScoreEntry::new("MBPP", "Code", "pass@1", 50.0),
    ];
    let names: Vec<_> = CategoryAggregator::default()
        .radar(&entries)
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Code", "Math"]);
}

#[test]
fn test_rounding_to_one_decimal() {
    let entries = vec![
        ScoreEntry::new("A", "Knowledge", "accuracy", 66.0),
        ScoreEntry::new("B", "Knowledge", "accuracy", 66.0),
        ScoreEntry::new("C", "Knowledge", "accuracy", 67.0),
    ];
    let radar = CategoryAggregator::default().radar(&entries);
    assert_relative_eq!(radar[0].score, 66.3, epsilon = 1e-9);
}

#[test]
fn test_empty_input_gives_empty_summary() {
    let summary = CategoryAggregator::default().summarize(&[]);
    assert!(summary.radar.is_empty());
    assert!(summary.table.is_empty());
    assert!(summary.timing.is_none());
}

#[test]
fn test_configured_fragments_drive_exclusion() {
    let aggregator = CategoryAggregator::new(ScoreNormalizer::with_fragments(["wer"]));
    let entries = vec![
        ScoreEntry::new("LibriSpeech", "Speech", "WER", 0.1),
        ScoreEntry::new("WikiText", "Language", "ppl", 0.5),
    ];
    let radar = aggregator.radar(&entries);
    assert_eq!(radar.len(), 1);
    assert_eq!(radar[0].name, "Language");
    assert_relative_eq!(radar[0].score, 50.0, epsilon = 1e-9);
}
