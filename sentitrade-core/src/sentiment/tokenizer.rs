//! Word-level tokenizer producing padded, masked batches.

use std::collections::HashMap;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const CLS_ID: u32 = 2;
pub const SEP_ID: u32 = 3;
const FIRST_WORD_ID: u32 = 4;

/// Longest sequence (special tokens included) the tokenizer emits.
pub const DEFAULT_MAX_LEN: usize = 512;

/// A batch of encoded headlines padded to the longest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    pub input_ids: Vec<Vec<u32>>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<Vec<u8>>,
}

impl TokenBatch {
    /// Number of rows (headlines).
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Padded sequence length shared by every row.
    pub fn seq_len(&self) -> usize {
        self.input_ids.first().map_or(0, Vec::len)
    }

    /// Unmasked token ids of row `i`.
    pub fn tokens(&self, i: usize) -> impl Iterator<Item = u32> + '_ {
        self.input_ids[i]
            .iter()
            .zip(&self.attention_mask[i])
            .filter(|&(_, &m)| m == 1)
            .map(|(&id, _)| id)
    }
}

/// Lowercasing word tokenizer over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: HashMap<String, u32>,
    max_len: usize,
}

impl Tokenizer {
    /// Build a vocabulary from `words`; ids follow first occurrence.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = HashMap::new();
        for word in words {
            let next = FIRST_WORD_ID + vocab.len() as u32;
            vocab.entry(word.as_ref().to_lowercase()).or_insert(next);
        }
        Self {
            vocab,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        // CLS + SEP always fit
        self.max_len = max_len.max(2);
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Vocabulary size including the special tokens.
    pub fn vocab_size(&self) -> usize {
        FIRST_WORD_ID as usize + self.vocab.len()
    }

    pub fn token_id(&self, word: &str) -> u32 {
        self.vocab.get(word).copied().unwrap_or(UNK_ID)
    }

    /// Split text into lowercase alphanumeric words.
    pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
    }

    /// `CLS word… SEP`, truncated to `max_len`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::with_capacity(16);
        ids.push(CLS_ID);
        ids.extend(
            Self::words(text)
                .map(|w| self.token_id(&w))
                .take(self.max_len - 2),
        );
        ids.push(SEP_ID);
        ids
    }

    /// Encode every text and pad all rows to the longest one.
    pub fn encode_batch(&self, texts: &[String]) -> TokenBatch {
        let encoded: Vec<Vec<u32>> = texts.iter().map(|t| self.encode(t)).collect();
        let width = encoded.iter().map(Vec::len).max().unwrap_or(0);

        let mut input_ids = Vec::with_capacity(encoded.len());
        let mut attention_mask = Vec::with_capacity(encoded.len());
        for mut row in encoded {
            let real = row.len();
            row.resize(width, PAD_ID);
            let mut mask = vec![1u8; real];
            mask.resize(width, 0);
            input_ids.push(row);
            attention_mask.push(mask);
        }
        TokenBatch {
            input_ids,
            attention_mask,
        }
    }
}
