//! Capability boundary between the embedder and a concrete language model.
//!
//! The embedder needs two things from a model: deterministic tokenization and a
//! forward pass that yields one final-layer hidden vector per token.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Tokenize `text` with special tokens included, truncated to at most
    /// `max_length` ids.
    async fn tokenize(&self, text: &str, max_length: usize) -> Result<Vec<u32>>;
}

#[async_trait]
pub trait EncoderModel: Send + Sync {
    /// Run `token_ids` through the model and return the final hidden layer,
    /// one vector per input token.
    async fn forward(&self, token_ids: &[u32]) -> Result<Vec<Vec<f32>>>;
}

/// Truncate a tokenized sequence to `max_length`.
///
/// When the sequence ends with a special token (end-of-sequence), the cut
/// happens before it and the special token is kept as the last id.
pub fn truncate_tokens(ids: &mut Vec<u32>, max_length: usize, trailing_special: bool) {
    if ids.len() <= max_length {
        return;
    }
    if trailing_special && max_length > 0 {
        let last = ids[ids.len() - 1];
        ids.truncate(max_length - 1);
        ids.push(last);
    } else {
        ids.truncate(max_length);
    }
}
