//! Lexicon sentiment model: per-word logit weights summed over each headline.
//!
//! Every vocabulary word carries a `[positive, negative, neutral]` weight
//! triple. A headline scores `bias + Σ weights(token)` over its unmasked
//! tokens, so a headline with no lexicon words leans neutral through the bias.
//!
//! The built-in financial lexicon is tiered: strong words move the logits
//! twice as far as mild ones. A single strong headline lands around 0.98
//! confidence; it takes agreement across several headlines to clear the
//! 0.999 trading threshold.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::{Logits, SentimentModel};
use super::tokenizer::{TokenBatch, Tokenizer};
use super::SentimentError;

const STRONG_POSITIVE: Logits = [4.0, -2.0, -1.0];
const MILD_POSITIVE: Logits = [2.0, -1.0, -0.5];
const STRONG_NEGATIVE: Logits = [-2.0, 4.0, -1.0];
const MILD_NEGATIVE: Logits = [-1.0, 2.0, -0.5];
const NEUTRAL_BIAS: Logits = [0.0, 0.0, 1.0];

const STRONG_POSITIVE_WORDS: &[&str] = &[
    "surge", "surges", "surged", "soar", "soars", "soared", "rally", "rallies", "rallied",
    "record", "beat", "beats", "upgrade", "upgraded", "outperform", "outperformed", "bullish",
    "boom", "breakthrough", "skyrocket", "skyrockets", "jump", "jumps", "jumped", "pleased",
    "optimistic", "exceeded", "exceeds", "positively", "delighted",
];

const MILD_POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "gained", "rise", "rises", "rose", "up", "higher", "growth", "grow",
    "grows", "strong", "stronger", "improve", "improved", "improves", "positive", "recover",
    "recovery", "rebound", "rebounds", "expand", "expansion", "profit", "profits", "dividend",
    "buyback", "approval", "approved", "confident",
];

const STRONG_NEGATIVE_WORDS: &[&str] = &[
    "negatively", "displeased", "plunge", "plunges", "plunged", "plummet", "plummets",
    "plummeted", "crash", "crashes", "crashed", "collapse", "collapsed", "bankruptcy",
    "bankrupt", "fraud", "lawsuit", "downgrade", "downgraded", "slump", "slumped", "tumble",
    "tumbled", "selloff", "recession", "layoffs", "scandal", "disappointing", "disappointed",
    "bearish",
];

const MILD_NEGATIVE_WORDS: &[&str] = &[
    "decline", "declined", "declines", "drop", "dropped", "drops", "fall", "falls", "fell",
    "weak", "weaker", "weakness", "concern", "concerns", "risk", "risks", "lower", "cut",
    "cuts", "slow", "slowdown", "volatile", "uncertainty", "pressure", "down", "negative",
    "loss", "losses", "miss", "missed",
];

/// One lexicon word and its logit weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub word: String,
    pub logits: Logits,
}

/// A serializable lexicon: bias plus word weights.
///
/// TOML form:
/// ```toml
/// bias = [0.0, 0.0, 1.0]
///
/// [[words]]
/// word = "rally"
/// logits = [4.0, -2.0, -1.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    #[serde(default = "default_bias")]
    pub bias: Logits,
    #[serde(default)]
    pub words: Vec<LexiconEntry>,
}

fn default_bias() -> Logits {
    NEUTRAL_BIAS
}

impl Lexicon {
    /// Built-in financial headline lexicon.
    pub fn builtin() -> Self {
        let tiers: [(&[&str], Logits); 4] = [
            (STRONG_POSITIVE_WORDS, STRONG_POSITIVE),
            (MILD_POSITIVE_WORDS, MILD_POSITIVE),
            (STRONG_NEGATIVE_WORDS, STRONG_NEGATIVE),
            (MILD_NEGATIVE_WORDS, MILD_NEGATIVE),
        ];
        let words = tiers
            .iter()
            .flat_map(|(words, logits)| {
                words.iter().map(move |w| LexiconEntry {
                    word: (*w).to_string(),
                    logits: *logits,
                })
            })
            .collect();
        Self {
            bias: NEUTRAL_BIAS,
            words,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, SentimentError> {
        let lexicon: Self =
            toml::from_str(s).map_err(|e| SentimentError::Lexicon(e.to_string()))?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn from_path(path: &Path) -> Result<Self, SentimentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), SentimentError> {
        if self.bias.iter().any(|v| !v.is_finite()) {
            return Err(SentimentError::Lexicon("bias must be finite".into()));
        }
        for entry in &self.words {
            if entry.word.trim().is_empty() {
                return Err(SentimentError::Lexicon("empty lexicon word".into()));
            }
            if entry.logits.iter().any(|v| !v.is_finite()) {
                return Err(SentimentError::Lexicon(format!(
                    "non-finite weight for '{}'",
                    entry.word
                )));
            }
        }
        Ok(())
    }

    /// Build the tokenizer and the model sharing one vocabulary.
    ///
    /// Later duplicates of a word are ignored, matching the tokenizer.
    pub fn build(&self) -> (Tokenizer, LexiconModel) {
        let tokenizer = Tokenizer::from_words(self.words.iter().map(|e| e.word.as_str()));
        let mut weights = HashMap::with_capacity(self.words.len());
        for entry in &self.words {
            let id = tokenizer.token_id(&entry.word.to_lowercase());
            weights.entry(id).or_insert(entry.logits);
        }
        let model = LexiconModel {
            name: format!("lexicon-{}", self.words.len()),
            bias: self.bias,
            weights,
        };
        (tokenizer, model)
    }
}

/// Scores token batches from a lexicon keyed by token id.
#[derive(Debug, Clone)]
pub struct LexiconModel {
    name: String,
    bias: Logits,
    weights: HashMap<u32, Logits>,
}

impl LexiconModel {
    fn score_row(&self, batch: &TokenBatch, row: usize) -> Logits {
        let mut logits = self.bias;
        for id in batch.tokens(row) {
            if let Some(w) = self.weights.get(&id) {
                for (acc, v) in logits.iter_mut().zip(w) {
                    *acc += v;
                }
            }
        }
        logits
    }
}

impl SentimentModel for LexiconModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn logits(&self, batch: &TokenBatch) -> Result<Vec<Logits>, SentimentError> {
        Ok((0..batch.len()).map(|row| self.score_row(batch, row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_tiers_do_not_overlap() {
        let lexicon = Lexicon::builtin();
        let unique: HashSet<&str> = lexicon.words.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(unique.len(), lexicon.words.len());
    }

    #[test]
    fn unknown_words_score_the_bias() {
        let (tokenizer, model) = Lexicon::builtin().build();
        let batch = tokenizer.encode_batch(&["the committee met on tuesday".into()]);
        assert_eq!(model.logits(&batch).unwrap(), vec![NEUTRAL_BIAS]);
    }

    #[test]
    fn lexicon_words_add_their_weights() {
        let (tokenizer, model) = Lexicon::builtin().build();
        let batch = tokenizer.encode_batch(&["Shares surge after upgrade".into()]);
        let logits = model.logits(&batch).unwrap();
        assert_eq!(logits, vec![[8.0, -4.0, -1.0]]);
    }

    #[test]
    fn padding_does_not_change_scores() {
        let (tokenizer, model) = Lexicon::builtin().build();
        let alone = tokenizer.encode_batch(&["stocks plunge".into()]);
        let padded = tokenizer.encode_batch(&[
            "stocks plunge".into(),
            "a much longer headline with many more words in it".into(),
        ]);
        assert_eq!(
            model.logits(&alone).unwrap()[0],
            model.logits(&padded).unwrap()[0]
        );
    }

    #[test]
    fn toml_lexicon_round_trip() {
        let lexicon = Lexicon::from_toml_str(
            r#"
            bias = [0.0, 0.0, 0.5]

            [[words]]
            word = "moon"
            logits = [3.0, -1.0, 0.0]
            "#,
        )
        .unwrap();
        assert_eq!(lexicon.bias, [0.0, 0.0, 0.5]);
        let (tokenizer, model) = lexicon.build();
        let batch = tokenizer.encode_batch(&["to the MOON".into()]);
        assert_eq!(model.logits(&batch).unwrap(), vec![[3.0, -1.0, 0.5]]);
    }

    #[test]
    fn toml_lexicon_rejects_blank_words() {
        let err = Lexicon::from_toml_str(
            r#"
            [[words]]
            word = " "
            logits = [1.0, 0.0, 0.0]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SentimentError::Lexicon(_)));
    }
}
