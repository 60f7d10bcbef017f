//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! the normalising wrappers used at both ingestion and query time, and pure
//! helpers for vector serialization and similarity.
//!
//! Concrete providers (fastembed, OpenAI, Ollama, hashing) live in the
//! `rag-harness` app crate.
//!
//! # Normalization
//!
//! Every vector that enters or queries the index goes through
//! [`embed_normalized`] or [`embed_query`], which L2-normalise the raw
//! provider output. Cosine similarity then reduces to a dot product.

use async_trait::async_trait;

use crate::error::RetrievalError;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"paraphrase-multilingual-minilm-l12-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Embed `texts` in batches of `batch_size` and L2-normalise the results.
///
/// Fails fast: a provider error, a missing or extra vector, a vector of the
/// wrong dimensionality, or a zero/non-finite vector aborts the whole call
/// with [`RetrievalError::Embedding`]. No placeholder vectors are produced.
pub async fn embed_normalized(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, RetrievalError> {
    let dims = embedder.dims();
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let raw = embedder
            .embed_batch(batch)
            .await
            .map_err(|e| RetrievalError::Embedding(format!("{:#}", e)))?;

        if raw.len() != batch.len() {
            return Err(RetrievalError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                raw.len(),
                batch.len()
            )));
        }

        for mut vector in raw {
            let position = vectors.len();
            if vector.len() != dims {
                return Err(RetrievalError::Embedding(format!(
                    "vector {} has {} dimensions, expected {}",
                    position,
                    vector.len(),
                    dims
                )));
            }
            if !normalize(&mut vector) {
                return Err(RetrievalError::Embedding(format!(
                    "vector {} is zero or not finite",
                    position
                )));
            }
            vectors.push(vector);
        }
    }

    Ok(vectors)
}

/// Embed and normalise a single query string.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, RetrievalError> {
    embed_normalized(embedder, &[text.to_string()], 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RetrievalError::Embedding("empty embedding response".to_string()))
}

/// Scale `vector` to unit L2 norm in place.
///
/// Returns `false` (leaving the vector untouched) when the norm is zero or
/// any component is not finite.
pub fn normalize(vector: &mut [f32]) -> bool {
    if vector.iter().any(|x| !x.is_finite()) {
        return false;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON || !norm.is_finite() {
        return false;
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    true
}

/// Dot product of two equal-length vectors; `0.0` on length mismatch.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use rag_harness_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), Some(v));
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Returns `None` when the length is not a multiple of 4 (truncated data).
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
