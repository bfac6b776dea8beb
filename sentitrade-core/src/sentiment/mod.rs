//! Sentiment estimation: headline list in, (label, confidence) out.
//!
//! The estimator tokenizes the whole headline window as one padded batch,
//! scores it with a `SentimentModel`, then aggregates:
//!
//! 1. per-class logits are **summed** across headlines (not averaged),
//! 2. the sum goes through one numerically stable softmax,
//! 3. the arg-max class is the label and its probability the confidence.
//!
//! Summing lets several agreeing headlines compound into a confident signal,
//! which is what the 0.999 trading threshold is calibrated against.

pub mod lexicon;
pub mod model;
pub mod tokenizer;

pub use lexicon::{Lexicon, LexiconEntry, LexiconModel};
pub use model::{Logits, SentimentModel};
pub use tokenizer::{TokenBatch, Tokenizer};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sentiment class. Declaration order is the model's logit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const CLASSES: [SentimentLabel; 3] = [Self::Positive, Self::Negative, Self::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated sentiment for one news window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    /// Probability mass of `label`, in `[0, 1]`.
    pub confidence: f64,
}

impl SentimentResult {
    pub fn new(label: SentimentLabel, confidence: f64) -> Self {
        Self { label, confidence }
    }

    /// Result for an empty window: neutral with zero confidence.
    pub fn neutral() -> Self {
        Self::new(SentimentLabel::Neutral, 0.0)
    }
}

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("model returned {got} logit rows for a batch of {expected} headlines")]
    BatchMismatch { expected: usize, got: usize },

    #[error("model produced a non-finite logit")]
    NonFiniteLogit,

    #[error("lexicon error: {0}")]
    Lexicon(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Softmax with the max subtracted first so large logits cannot overflow.
pub fn softmax(logits: &Logits) -> Logits {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = (*logits).map(|v| (v - max).exp());
    let total: f64 = exps.iter().sum();
    exps.map(|e| e / total)
}

/// Sum logit rows, normalize once, and pick the arg-max class.
///
/// Ties resolve to the earliest class in `CLASSES` order.
pub fn aggregate(rows: &[Logits]) -> Result<SentimentResult, SentimentError> {
    if rows.is_empty() {
        return Ok(SentimentResult::neutral());
    }
    let mut summed = [0.0; 3];
    for row in rows {
        for (acc, v) in summed.iter_mut().zip(row) {
            *acc += v;
        }
    }
    if summed.iter().any(|v| !v.is_finite()) {
        return Err(SentimentError::NonFiniteLogit);
    }

    let probs = softmax(&summed);
    let mut best = 0;
    for (i, p) in probs.iter().enumerate().skip(1) {
        if *p > probs[best] {
            best = i;
        }
    }
    Ok(SentimentResult::new(SentimentLabel::CLASSES[best], probs[best]))
}

/// Tokenizer + model pair. Built once at startup and shared read-only.
pub struct SentimentEstimator {
    tokenizer: Tokenizer,
    model: Box<dyn SentimentModel>,
}

impl SentimentEstimator {
    pub fn new(tokenizer: Tokenizer, model: Box<dyn SentimentModel>) -> Self {
        Self { tokenizer, model }
    }

    pub fn from_lexicon(lexicon: &Lexicon) -> Self {
        let (tokenizer, model) = lexicon.build();
        Self::new(tokenizer, Box::new(model))
    }

    /// Estimator over the built-in financial lexicon.
    pub fn builtin() -> Self {
        Self::from_lexicon(&Lexicon::builtin())
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Estimate the sentiment of a headline window.
    ///
    /// An empty window returns `(neutral, 0.0)` without calling the model.
    pub fn estimate(&self, headlines: &[String]) -> Result<SentimentResult, SentimentError> {
        if headlines.is_empty() {
            return Ok(SentimentResult::neutral());
        }
        let batch = self.tokenizer.encode_batch(headlines);
        let rows = self.model.logits(&batch)?;
        if rows.len() != batch.len() {
            return Err(SentimentError::BatchMismatch {
                expected: batch.len(),
                got: rows.len(),
            });
        }
        aggregate(&rows)
    }
}

impl fmt::Debug for SentimentEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentimentEstimator")
            .field("model", &self.model.name())
            .field("vocab_size", &self.tokenizer.vocab_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headlines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_window_is_neutral_zero() {
        let estimator = SentimentEstimator::builtin();
        let result = estimator.estimate(&[]).unwrap();
        assert_eq!(result, SentimentResult::new(SentimentLabel::Neutral, 0.0));
    }

    #[test]
    fn negative_fixture_clears_threshold() {
        let estimator = SentimentEstimator::builtin();
        let result = estimator
            .estimate(&headlines(&[
                "markets responded negatively to the news!",
                "traders were displeased!",
            ]))
            .unwrap();
        assert_eq!(result.label, SentimentLabel::Negative);
        assert!(result.confidence > 0.999, "confidence {}", result.confidence);
    }

    #[test]
    fn single_strong_headline_stays_below_threshold() {
        let estimator = SentimentEstimator::builtin();
        let result = estimator.estimate(&headlines(&["Stocks rally"])).unwrap();
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!(result.confidence > 0.9 && result.confidence < 0.999);
    }

    #[test]
    fn agreeing_positive_headlines_compound() {
        let estimator = SentimentEstimator::builtin();
        let result = estimator
            .estimate(&headlines(&[
                "Shares surge on record quarter",
                "Analysts upgrade the stock",
                "Index rallies into the close",
            ]))
            .unwrap();
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!(result.confidence > 0.999);
    }

    #[test]
    fn plain_headlines_lean_neutral() {
        let estimator = SentimentEstimator::builtin();
        let result = estimator
            .estimate(&headlines(&["Company schedules annual meeting"]))
            .unwrap();
        assert_eq!(result.label, SentimentLabel::Neutral);
    }

    #[test]
    fn aggregation_sums_before_normalizing() {
        // Averaging would give softmax([1, 0, 0]) ≈ 0.576; summing gives softmax([4, 0, 0]).
        let rows = [[1.0, 0.0, 0.0]; 4];
        let result = aggregate(&rows).unwrap();
        let expected = 4f64.exp() / (4f64.exp() + 2.0);
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!((result.confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 999.0, -1000.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn ties_pick_first_class() {
        let result = aggregate(&[[0.0, 0.0, 0.0]]).unwrap();
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!((result.confidence - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_logits_are_rejected() {
        let err = aggregate(&[[f64::NAN, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, SentimentError::NonFiniteLogit));
    }

    struct ShortModel;

    impl SentimentModel for ShortModel {
        fn name(&self) -> &str {
            "short"
        }

        fn logits(&self, _batch: &TokenBatch) -> Result<Vec<Logits>, SentimentError> {
            Ok(vec![[0.0, 0.0, 1.0]])
        }
    }

    #[test]
    fn row_count_mismatch_is_an_error() {
        let estimator = SentimentEstimator::new(Tokenizer::from_words(["x"]), Box::new(ShortModel));
        let err = estimator.estimate(&headlines(&["a", "b"])).unwrap_err();
        assert!(matches!(
            err,
            SentimentError::BatchMismatch {
                expected: 2,
                got: 1
            }
        ));
    }
}
