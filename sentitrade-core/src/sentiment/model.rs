//! The seam between the estimator and whatever produces per-headline scores.

use super::tokenizer::TokenBatch;
use super::SentimentError;

/// Per-headline class scores in `[positive, negative, neutral]` order.
pub type Logits = [f64; 3];

/// A sequence classifier scoring a whole token batch at once.
///
/// Implementations must return exactly one row per batch row, in batch order.
/// Padding positions (attention mask 0) must not influence the scores.
pub trait SentimentModel: Send + Sync {
    /// Model name for logs and run manifests.
    fn name(&self) -> &str;

    fn logits(&self, batch: &TokenBatch) -> Result<Vec<Logits>, SentimentError>;
}
