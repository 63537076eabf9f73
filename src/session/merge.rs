//! Joining external feature vectors onto chunks.
//!
//! Vectors come from a separate stream keyed by window midpoint `t`. The two
//! producers stamp time from different clocks, so a configured offset is added
//! to `t` before matching.

use crate::core::windowing::Chunk;
use crate::error::{PerceptionError, Result};
use crate::session::manifest::{write_json, SessionManifest};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One externally computed feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Window midpoint, in the vector producer's clock
    pub t: f64,
    #[serde(default)]
    pub x: Vec<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A chunk list as written either bare or inside a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkDocument {
    Chunks(Vec<Chunk>),
    Manifest(SessionManifest),
}

impl ChunkDocument {
    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        match self {
            ChunkDocument::Chunks(chunks) => chunks,
            ChunkDocument::Manifest(manifest) => &mut manifest.chunks,
        }
    }
}

/// Attach to each chunk every vector with `start <= t + offset < end`.
///
/// Every chunk's `vectors` is replaced, empty when nothing matched. Returns
/// the number of attachments made.
pub fn merge_vectors(chunks: &mut [Chunk], vectors: &[FeatureVector], offset_secs: f64) -> usize {
    let mut attached = 0;
    for chunk in chunks.iter_mut() {
        let matched: Vec<FeatureVector> = vectors
            .iter()
            .filter(|v| chunk.contains(v.t + offset_secs))
            .cloned()
            .collect();
        attached += matched.len();
        chunk.vectors = Some(matched);
    }
    attached
}

/// Read a JSONL vector stream.
pub fn read_vectors(path: &Path) -> Result<Vec<FeatureVector>> {
    if !path.exists() {
        return Err(PerceptionError::InputNotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut vectors = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let vector = serde_json::from_str(&line).map_err(|e| PerceptionError::MalformedRecord {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        vectors.push(vector);
    }
    Ok(vectors)
}

/// Merge a vector stream into a chunk or manifest file, keeping its shape.
pub fn merge_vectors_file(
    chunks_path: &Path,
    vectors_path: &Path,
    output_path: &Path,
    offset_secs: f64,
) -> Result<usize> {
    if !chunks_path.exists() {
        return Err(PerceptionError::InputNotFound(chunks_path.to_path_buf()));
    }
    let content = std::fs::read_to_string(chunks_path)?;
    let mut document: ChunkDocument = serde_json::from_str(&content)?;
    let vectors = read_vectors(vectors_path)?;

    if offset_secs != 0.0 {
        tracing::warn!(
            offset_secs,
            "Applying configured vector offset; vector and chunk clocks disagree"
        );
    }
    let attached = merge_vectors(document.chunks_mut(), &vectors, offset_secs);
    write_json(output_path, &document)?;

    tracing::info!(
        vectors = vectors.len(),
        attached,
        output = %output_path.display(),
        "Merged feature vectors"
    );
    Ok(attached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::windowing::WindowPlan;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chunk(start: f64, end: f64) -> Chunk {
        let window = WindowPlan { index: 0, start, end };
        Chunk::new(&window, "c.mp4".into(), "c.wav".into(), Vec::new())
    }

    fn vector(t: f64) -> FeatureVector {
        FeatureVector {
            t,
            x: vec![t],
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_merge_with_offset() {
        let mut chunks = vec![chunk(100.0, 102.0), chunk(102.0, 104.0)];
        let vectors = vec![vector(89.75), vector(90.25), vector(91.9), vector(92.0), vector(95.0)];

        let attached = merge_vectors(&mut chunks, &vectors, 10.0);
        assert_eq!(attached, 3);

        let ts = |c: &Chunk| -> Vec<f64> { c.vectors.as_ref().unwrap().iter().map(|v| v.t).collect() };
        assert_eq!(ts(&chunks[0]), vec![90.25, 91.9]);
        assert_eq!(ts(&chunks[1]), vec![92.0]);
    }

    #[test]
    fn test_unmatched_chunk_gets_empty_list() {
        let mut chunks = vec![chunk(0.0, 2.0)];
        merge_vectors(&mut chunks, &[vector(50.0)], 0.0);
        assert_eq!(chunks[0].vectors, Some(Vec::new()));
    }

    #[test]
    fn test_file_merge_keeps_manifest_shape() {
        let dir = tempfile::tempdir().unwrap();
        let chunks_path = dir.path().join("session_events.json");
        let vectors_path = dir.path().join("vector_windows.jsonl");
        let output = dir.path().join("merged.json");

        let manifest = json!({
            "session_id": "s",
            "notes": "kept",
            "chunks": [serde_json::to_value(chunk(0.0, 2.0)).unwrap()]
        });
        std::fs::write(&chunks_path, manifest.to_string()).unwrap();
        std::fs::write(&vectors_path, "{\"t\": 1.0, \"x\": [0.5]}\n\n{\"t\": 3.0, \"x\": []}\n").unwrap();

        assert_eq!(merge_vectors_file(&chunks_path, &vectors_path, &output, 0.0).unwrap(), 1);

        let merged: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(merged["notes"], json!("kept"));
        assert_eq!(merged["chunks"][0]["vectors"], json!([{"t": 1.0, "x": [0.5]}]));
    }

    #[test]
    fn test_file_merge_keeps_list_shape() {
        let dir = tempfile::tempdir().unwrap();
        let chunks_path = dir.path().join("chunks.json");
        let vectors_path = dir.path().join("v.jsonl");
        std::fs::write(
            &chunks_path,
            serde_json::to_string(&vec![chunk(0.0, 2.0), chunk(2.0, 4.0)]).unwrap(),
        )
        .unwrap();
        std::fs::write(&vectors_path, "{\"t\": 2.5, \"x\": [1.0], \"source\": \"stream\"}\n").unwrap();

        merge_vectors_file(&chunks_path, &vectors_path, &chunks_path, 0.0).unwrap();

        let merged: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&chunks_path).unwrap()).unwrap();
        assert!(merged.is_array());
        assert_eq!(merged[0]["vectors"], json!([]));
        assert_eq!(merged[1]["vectors"][0]["source"], json!("stream"));
    }

    #[test]
    fn test_file_merge_only_adds_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let chunks_path = dir.path().join("events.json");
        let vectors_path = dir.path().join("v.jsonl");
        let output = dir.path().join("merged.json");

        let mut record = serde_json::to_value(chunk(0.0, 2.0)).unwrap();
        record["valence"] = json!("unknown");
        record["embedding_id"] = json!("abc");
        std::fs::write(&chunks_path, json!([record]).to_string()).unwrap();
        std::fs::write(&vectors_path, "{\"t\": 0.5, \"x\": [1.0]}\n").unwrap();

        assert_eq!(merge_vectors_file(&chunks_path, &vectors_path, &output, 0.0).unwrap(), 1);

        let mut merged: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(merged[0]["vectors"], json!([{"t": 0.5, "x": [1.0]}]));
        merged[0].as_object_mut().unwrap().remove("vectors");
        assert_eq!(merged[0], record);
    }

    #[test]
    fn test_malformed_vector_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.jsonl");
        std::fs::write(&path, "{\"t\": 1.0}\nnot json\n").unwrap();
        assert!(matches!(
            read_vectors(&path),
            Err(PerceptionError::MalformedRecord { line: 2, .. })
        ));
    }
}
