use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IngestError, SearchError};
use crate::models::{ScoredChunk, TextChunk};
use crate::traits::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedder: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// Owns the on-disk index location. Builds fully replace whatever was there.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub async fn build(
        &self,
        chunks: &[TextChunk],
        embedder: &dyn Embedder,
    ) -> Result<PathBuf, IngestError> {
        if chunks.is_empty() {
            return Err(IngestError::EmptyDocument(
                "extraction produced no chunks to index".to_string(),
            ));
        }

        let dimensions = embedder.dimensions();
        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = embedder.embed(&chunk.text).await?;
            if vector.len() != dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                }
                .into());
            }
            entries.push(IndexEntry {
                chunk_id: chunk.chunk_id.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                vector,
            });
        }

        let persisted = PersistedIndex {
            version: FORMAT_VERSION,
            embedder: embedder.name().to_string(),
            dimensions,
            created_at: Utc::now(),
            entries,
        };
        let bytes = serde_json::to_vec(&persisted)?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.write_then_swap(&bytes).await?;

        info!(
            path = %path.display(),
            chunk_count = persisted.entries.len(),
            dimensions,
            embedder = %persisted.embedder,
            "vector index persisted"
        );
        Ok(path)
    }

    async fn write_then_swap(&self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let target = self.index_path();
        let staging = self
            .dir
            .join(format!(".{INDEX_FILE}.{}.tmp", Uuid::new_v4()));

        let written: std::io::Result<()> = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, &target).await
        }
        .await;

        if let Err(error) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(error);
        }

        Ok(target)
    }

    pub async fn load(&self) -> Result<IndexHandle, SearchError> {
        let path = self.index_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(SearchError::IndexNotFound(path));
            }
            Err(error) => return Err(error.into()),
        };

        let persisted: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|error| SearchError::CorruptIndex(error.to_string()))?;

        if persisted.version != FORMAT_VERSION {
            return Err(SearchError::CorruptIndex(format!(
                "unsupported format version {}",
                persisted.version
            )));
        }

        if let Some(entry) = persisted
            .entries
            .iter()
            .find(|entry| entry.vector.len() != persisted.dimensions)
        {
            return Err(SearchError::CorruptIndex(format!(
                "chunk {} has {} dimensions, index declares {}",
                entry.chunk_id,
                entry.vector.len(),
                persisted.dimensions
            )));
        }

        debug!(path = %path.display(), chunk_count = persisted.entries.len(), "vector index loaded");

        Ok(IndexHandle {
            embedder: persisted.embedder,
            dimensions: persisted.dimensions,
            created_at: persisted.created_at,
            entries: persisted.entries,
        })
    }
}

/// An immutable snapshot of the persisted index.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    embedder: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl IndexHandle {
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VectorIndex for IndexHandle {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        if query_vector.len() != self.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(query_vector, &entry.vector)))
            .collect();

        rank_by_score(&mut scored);

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(entry, score)| ScoredChunk {
                chunk_id: entry.chunk_id.clone(),
                chunk_index: entry.chunk_index,
                text: entry.text.clone(),
                score,
            })
            .collect())
    }
}

/// Best first. The sort is stable and treats `-0.0 == 0.0`, so equal scores keep insertion order.
fn rank_by_score<T>(scored: &mut [(T, f32)]) {
    scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}
