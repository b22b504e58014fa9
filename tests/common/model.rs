use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use semprint::embedding::traits::truncate_tokens;
use semprint::embedding::{EncoderModel, Tokenizer};
use semprint::error::{Result, SemprintError};

pub const BOS: u32 = 0;
pub const EOS: u32 = 2;
const VOCAB: u32 = 50_000;

/// Deterministic word-hashing model.
///
/// Each whitespace-separated word maps to a stable token id, and each token id
/// maps to a stable hidden vector, so equal sentences always produce equal
/// fingerprints.
pub struct FakeModel {
    pub width: usize,
    pub special_tokens: bool,
    fail_on: HashSet<String>,
    longest_forward: AtomicUsize,
    forward_calls: AtomicUsize,
}

impl FakeModel {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            special_tokens: true,
            fail_on: HashSet::new(),
            longest_forward: AtomicUsize::new(0),
            forward_calls: AtomicUsize::new(0),
        }
    }

    /// Tokenize without BOS/EOS, so an empty sentence yields no tokens.
    pub fn without_special_tokens(mut self) -> Self {
        self.special_tokens = false;
        self
    }

    /// Make tokenization of `sentence` fail.
    pub fn failing_on(mut self, sentence: &str) -> Self {
        self.fail_on.insert(sentence.to_string());
        self
    }

    pub fn longest_forward(&self) -> usize {
        self.longest_forward.load(Ordering::SeqCst)
    }

    pub fn forward_calls(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    pub fn hidden_vector(&self, id: u32) -> Vec<f32> {
        (0..self.width)
            .map(|j| (((id as f32) + 1.0) * ((j as f32) + 1.0) * 0.37).sin())
            .collect()
    }
}

fn word_id(word: &str) -> u32 {
    // FNV-1a
    let mut hash: u32 = 0x811c_9dc5;
    for b in word.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    3 + hash % (VOCAB - 3)
}

#[async_trait]
impl Tokenizer for FakeModel {
    async fn tokenize(&self, text: &str, max_length: usize) -> Result<Vec<u32>> {
        if self.fail_on.contains(text) {
            return Err(SemprintError::Tokenization(format!("cannot tokenize {text:?}")));
        }
        let mut ids = Vec::new();
        if self.special_tokens {
            ids.push(BOS);
        }
        ids.extend(text.split_whitespace().map(word_id));
        if self.special_tokens {
            ids.push(EOS);
        }
        truncate_tokens(&mut ids, max_length, self.special_tokens);
        Ok(ids)
    }
}

#[async_trait]
impl EncoderModel for FakeModel {
    async fn forward(&self, token_ids: &[u32]) -> Result<Vec<Vec<f32>>> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        self.longest_forward
            .fetch_max(token_ids.len(), Ordering::SeqCst);
        Ok(token_ids.iter().map(|&id| self.hidden_vector(id)).collect())
    }
}

/// A model whose hidden states are all zero.
pub struct ZeroModel {
    pub width: usize,
}

#[async_trait]
impl Tokenizer for ZeroModel {
    async fn tokenize(&self, text: &str, _max_length: usize) -> Result<Vec<u32>> {
        Ok(std::iter::once(BOS)
            .chain(text.split_whitespace().map(word_id))
            .chain(std::iter::once(EOS))
            .collect())
    }
}

#[async_trait]
impl EncoderModel for ZeroModel {
    async fn forward(&self, token_ids: &[u32]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![0.0; self.width]; token_ids.len()])
    }
}
