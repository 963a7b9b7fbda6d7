use serde::{Deserialize, Serialize};

/// Metric-name fragments whose scores fall as quality rises.
pub const DEFAULT_LOWER_IS_BETTER: &[&str] = &["ppl", "perplexity", "loss", "bpb", "bits_per_byte"];

/// Upper bound of the common reporting scale.
pub const SCALE_MAX: f64 = 100.0;

/// Maps raw engine scores onto the 0-100 scale.
///
/// Metrics whose name contains one of the configured fragments
/// (case-insensitive) are treated as lower-is-better and never reach a
/// category average.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreNormalizer {
    lower_is_better: Vec<String>,
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self::with_fragments(DEFAULT_LOWER_IS_BETTER.iter().copied())
    }
}

impl ScoreNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lower_is_better: fragments
                .into_iter()
                .map(|f| f.as_ref().trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn fragments(&self) -> &[String] {
        &self.lower_is_better
    }

    pub fn is_lower_is_better(&self, metric: &str) -> bool {
        let metric = metric.to_lowercase();
        self.lower_is_better.iter().any(|f| metric.contains(f.as_str()))
    }

    /// Unit-interval scores are scaled by 100; everything is capped at 100.
    pub fn scale(&self, raw: f64) -> f64 {
        let scaled = if (0.0..=1.0).contains(&raw) { raw * 100.0 } else { raw };
        scaled.min(SCALE_MAX)
    }

    /// The score to fold into a category average, or `None` for an
    /// excluded metric.
    pub fn normalize(&self, metric: &str, raw: f64) -> Option<f64> {
        if self.is_lower_is_better(metric) {
            None
        } else {
            Some(self.scale(raw))
        }
    }
}

/// Rounds to one decimal place for display.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
