//! Sentence embedding.
//!
//! Provides the model capability traits, the pooling/normalization math, the
//! `Embedder` that ties them together, and an HTTP-backed model.

pub mod embedder;
pub mod pooling;
pub mod tei;
pub mod traits;

pub use embedder::Embedder;
pub use tei::TeiModel;
pub use traits::{EncoderModel, Tokenizer};
