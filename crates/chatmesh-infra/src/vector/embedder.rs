//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait using fastembed's BGESmallENV15 model
//! (384 dimensions) with ONNX runtime inference. Model loading and
//! inference are both blocking, so both run on `spawn_blocking`.

use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use chatmesh_core::memory::Embedder;
use chatmesh_types::error::EmbedderError;

const MODEL_NAME: &str = "BAAI/bge-small-en-v1.5";
const DIMENSION: usize = 384;

pub struct FastEmbedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedEmbedder {
    pub fn try_new() -> Result<Self, EmbedderError> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::BGESmallENV15))
            .map_err(|e| EmbedderError::Provider(e.to_string()))?;
        Ok(Self { model: Arc::new(Mutex::new(model)) })
    }
}

impl Embedder for FastEmbedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let texts = texts.to_vec();
        let model = self.model.clone();

        tokio::task::spawn_blocking(move || {
            let model = model.blocking_lock();
            model.embed(texts, None).map_err(|e| EmbedderError::Provider(e.to_string()))
        })
        .await
        .map_err(|e| EmbedderError::Provider(format!("embedding task panicked: {e}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Loading the ONNX model is slow and network-dependent (first run
    // downloads it), so inference itself is left to integration tests.
    #[test]
    fn dimension_and_model_name_match_bge_small() {
        assert_eq!(DIMENSION, 384);
        assert_eq!(MODEL_NAME, "BAAI/bge-small-en-v1.5");
    }
}
