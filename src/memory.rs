//! Capability interfaces for downstream memory consumers.
//!
//! The perception core does not embed, index or judge clips itself. These
//! traits describe what a consumer plugs in; [`FlatIndex`] and
//! [`NeutralValence`] are minimal implementations for development and tests.

use crate::error::{PerceptionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Emotional judgement attached to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Bad,
    Neutral,
    Good,
}

/// Turns a chunk's media into a fixed-length embedding.
///
/// Implementations must return the same dimension for every call.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed(&self, video: &Path, audio: &Path) -> Result<Vec<f32>>;
}

/// Nearest-neighbour store of embeddings with attached metadata.
pub trait MemoryIndex {
    fn add(&mut self, embedding: Vec<f32>, meta: serde_json::Value) -> Result<()>;

    /// Up to `k` entries closest to `query`, nearest first, with distances.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(serde_json::Value, f32)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classifies an embedding into a valence.
pub trait ValencePredictor: Send + Sync {
    fn predict(&self, embedding: &[f32]) -> Valence;
}

/// Brute-force L2 index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    embeddings: Vec<Vec<f32>>,
    metadata: Vec<serde_json::Value>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            embeddings: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    fn check_dim(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.dim {
            return Err(PerceptionError::DimensionMismatch {
                expected: self.dim,
                actual: v.len(),
            });
        }
        Ok(())
    }
}

impl MemoryIndex for FlatIndex {
    fn add(&mut self, embedding: Vec<f32>, meta: serde_json::Value) -> Result<()> {
        self.check_dim(&embedding)?;
        self.embeddings.push(embedding);
        self.metadata.push(meta);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(serde_json::Value, f32)>> {
        self.check_dim(query)?;
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (i, squared_l2(query, e)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, d)| (self.metadata[i].clone(), d))
            .collect())
    }

    fn len(&self) -> usize {
        self.embeddings.len()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Predicts `Neutral` for everything until a trained classifier exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralValence;

impl ValencePredictor for NeutralValence {
    fn predict(&self, _embedding: &[f32]) -> Valence {
        Valence::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Embeds a clip as the byte lengths of its two file names.
    struct NameEmbedder;

    impl Embedder for NameEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, video: &Path, audio: &Path) -> Result<Vec<f32>> {
            Ok(vec![
                video.as_os_str().len() as f32,
                audio.as_os_str().len() as f32,
            ])
        }
    }

    #[test]
    fn test_flat_index_nearest_first() {
        let mut index = FlatIndex::new(2);
        index.add(vec![0.0, 0.0], json!({"chunk": 0})).unwrap();
        index.add(vec![5.0, 5.0], json!({"chunk": 1})).unwrap();
        index.add(vec![1.0, 1.0], json!({"chunk": 2})).unwrap();

        let hits = index.search(&[0.9, 0.9], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, json!({"chunk": 2}));
        assert_eq!(hits[1].0, json!({"chunk": 0}));
        assert!(hits[0].1 < hits[1].1);
    }

    #[test]
    fn test_flat_index_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.add(vec![1.0], json!(null)),
            Err(PerceptionError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert!(index.is_empty());
        assert!(index.search(&[0.0; 2], 1).is_err());
    }

    #[test]
    fn test_embed_index_predict() {
        let embedder = NameEmbedder;
        let mut index = FlatIndex::new(embedder.dimension());
        let e = embedder
            .embed(Path::new("chunk_0000.mp4"), Path::new("chunk_0000.wav"))
            .unwrap();
        index.add(e.clone(), json!({"index": 0})).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(NeutralValence.predict(&e), Valence::Neutral);
    }

    #[test]
    fn test_valence_wire_names() {
        assert_eq!(serde_json::to_value(Valence::Good).unwrap(), json!("good"));
        let v: Valence = serde_json::from_value(json!("bad")).unwrap();
        assert_eq!(v, Valence::Bad);
    }
}
