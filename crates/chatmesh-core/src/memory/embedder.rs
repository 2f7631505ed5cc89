//! Embedder trait for text-to-vector conversion.
//!
//! Implementations (FastEmbed locally, an OpenAI-compatible embeddings
//! endpoint remotely) live in `chatmesh-infra`.

use chatmesh_types::error::EmbedderError;

/// Trait for converting text into embedding vectors.
///
/// Implementations live in `chatmesh-infra`.
pub trait Embedder: Send + Sync {
    /// Embed one or more texts into vectors, one output vector per input.
    fn embed(&self, texts: &[String]) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbedderError>> + Send;

    /// The model name used for embeddings (e.g. "BAAI/bge-small-en-v1.5").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
