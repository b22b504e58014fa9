//! Model capability backed by a text-embeddings-inference server.
//!
//! Tokenization goes through `POST /tokenize`; the forward pass uses
//! `POST /embed_all`, which returns final-layer hidden states per token.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::config::EmbeddingConfig;
use crate::error::{Result, SemprintError};

use super::traits::{truncate_tokens, EncoderModel, Tokenizer};

#[derive(Debug, Deserialize)]
struct ServerInfo {
    model_id: String,
    #[serde(default)]
    max_input_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    id: u32,
    #[serde(default)]
    special: bool,
}

pub struct TeiModel {
    base_url: Url,
    http: reqwest::Client,
    model_id: String,
    max_input_length: Option<usize>,
}

impl TeiModel {
    /// Connect and confirm the model is loaded. Any failure here is fatal for
    /// the embedder.
    pub async fn connect(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| SemprintError::ModelUnavailable(format!("{}: {e}", config.url)))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SemprintError::ModelUnavailable(e.to_string()))?;

        let info_url = join(&base_url, "info").map_err(SemprintError::ModelUnavailable)?;
        let resp = http
            .get(info_url)
            .send()
            .await
            .map_err(|e| SemprintError::ModelUnavailable(format!("info request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(SemprintError::ModelUnavailable(format!(
                "info request returned {}",
                resp.status()
            )));
        }
        let info: ServerInfo = resp
            .json()
            .await
            .map_err(|e| SemprintError::ModelUnavailable(format!("bad info response: {e}")))?;

        info!(model = %info.model_id, url = %base_url, "initialized embedding model");

        Ok(Self {
            base_url,
            http,
            model_id: info.model_id,
            max_input_length: info.max_input_length,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The server's own input limit, if it reports one.
    pub fn max_input_length(&self) -> Option<usize> {
        self.max_input_length
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> std::result::Result<T, String>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = join(&self.base_url, path)?;
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("{path} request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("{path} failed ({status}): {text}"));
        }

        resp.json::<T>()
            .await
            .map_err(|e| format!("{path} response parse failed: {e}"))
    }
}

fn join(base: &Url, path: &str) -> std::result::Result<Url, String> {
    base.join(path).map_err(|e| format!("invalid path {path}: {e}"))
}

#[async_trait]
impl Tokenizer for TeiModel {
    async fn tokenize(&self, text: &str, max_length: usize) -> Result<Vec<u32>> {
        let body = serde_json::json!({
            "inputs": text,
            "add_special_tokens": true,
        });
        let mut batches: Vec<Vec<TokenInfo>> = self
            .post("tokenize", &body)
            .await
            .map_err(SemprintError::Tokenization)?;

        let tokens = batches.pop().unwrap_or_default();
        let trailing_special = tokens.last().is_some_and(|t| t.special);
        let mut ids: Vec<u32> = tokens.into_iter().map(|t| t.id).collect();

        let limit = self
            .max_input_length
            .map_or(max_length, |server| server.min(max_length));
        truncate_tokens(&mut ids, limit, trailing_special);
        Ok(ids)
    }
}

#[async_trait]
impl EncoderModel for TeiModel {
    async fn forward(&self, token_ids: &[u32]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "inputs": [token_ids],
            "truncate": false,
        });
        let mut batches: Vec<Vec<Vec<f32>>> = self
            .post("embed_all", &body)
            .await
            .map_err(SemprintError::Inference)?;

        batches
            .pop()
            .ok_or_else(|| SemprintError::Inference("embed_all returned no output".into()))
    }
}
