use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::error::{Result, SemprintError};
use crate::types::SentenceVector;

use super::pooling::{l2_normalize, mean_pool};
use super::traits::{EncoderModel, Tokenizer};

/// Turns sentences into unit-norm fingerprints.
///
/// Each sentence is processed on its own: tokenize, forward, mean-pool over
/// all tokens, normalize. Nothing is cached between calls.
pub struct Embedder {
    tokenizer: Arc<dyn Tokenizer>,
    model: Arc<dyn EncoderModel>,
    max_length: usize,
    dimension: usize,
}

impl Embedder {
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        model: Arc<dyn EncoderModel>,
        max_length: usize,
        dimension: usize,
    ) -> Result<Self> {
        if max_length == 0 {
            return Err(SemprintError::Validation("max_length must be > 0".into()));
        }
        if dimension == 0 {
            return Err(SemprintError::Validation("dimension must be > 0".into()));
        }
        Ok(Self {
            tokenizer,
            model,
            max_length,
            dimension,
        })
    }

    /// Build an embedder from a single value that provides both capabilities.
    pub fn from_model<M>(model: Arc<M>, max_length: usize, dimension: usize) -> Result<Self>
    where
        M: Tokenizer + EncoderModel + 'static,
    {
        Self::new(model.clone(), model, max_length, dimension)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Embed every sentence, one outcome per input in input order.
    ///
    /// A failing sentence does not abort the batch; its slot holds the error.
    #[instrument(skip_all, fields(sentences = sentences.len()))]
    pub async fn embed<S: AsRef<str>>(&self, sentences: &[S]) -> Vec<Result<SentenceVector>> {
        let mut out = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let outcome = self.embed_one(sentence.as_ref()).await;
            if let Err(e) = &outcome {
                warn!(index, error = %e, "failed to embed sentence");
            }
            out.push(outcome);
        }
        out
    }

    /// Embed every sentence, failing on the first sentence that cannot be embedded.
    pub async fn embed_all<S: AsRef<str>>(&self, sentences: &[S]) -> Result<Vec<SentenceVector>> {
        self.embed(sentences)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, r)| {
                r.map_err(|e| SemprintError::Sentence {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }

    /// Embed a single sentence. Every call is counted in the embedding metrics.
    pub async fn embed_one(&self, sentence: &str) -> Result<SentenceVector> {
        let start = Instant::now();
        let outcome = self.embed_sentence(sentence).await;
        let label = match &outcome {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        crate::metrics::EMBEDDINGS_TOTAL
            .with_label_values(&[label])
            .inc();
        crate::metrics::EMBEDDING_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());
        outcome
    }

    async fn embed_sentence(&self, sentence: &str) -> Result<SentenceVector> {
        let ids = self.tokenizer.tokenize(sentence, self.max_length).await?;
        if ids.is_empty() {
            return Err(SemprintError::EmptyTokens);
        }
        if ids.len() > self.max_length {
            return Err(SemprintError::Tokenization(format!(
                "tokenizer returned {} ids, limit is {}",
                ids.len(),
                self.max_length
            )));
        }

        let hidden = self.model.forward(&ids).await?;
        if hidden.len() != ids.len() {
            return Err(SemprintError::Inference(format!(
                "model returned {} token vectors for {} tokens",
                hidden.len(),
                ids.len()
            )));
        }

        let pooled = mean_pool(&hidden, self.dimension)?;
        let vector = l2_normalize(pooled)?;
        debug!(tokens = ids.len(), "embedded sentence");
        Ok(vector)
    }
}
