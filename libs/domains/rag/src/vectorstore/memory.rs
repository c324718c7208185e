use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{RagError, RagResult};
use crate::metadata::{Metadata, metadata_from_json};
use crate::models::{Document, SearchQuery, SearchResult};
use crate::provider::{Embedder, VectorStore};

const EMBED_BATCH_SIZE: usize = 64;

struct Entry {
    document: Document,
    vector: Vec<f32>,
}

/// Brute-force cosine search over documents held in process.
///
/// Used when no remote vector store is configured. Texts are embedded on
/// insert and on every search with the same [`Embedder`].
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Loads a JSON-lines seed file and indexes every record in it.
    pub async fn seed_from_file(&self, path: impl AsRef<Path>) -> RagResult<usize> {
        let path = path.as_ref();
        let documents = load_seed_file(path).await?;
        let count = documents.len();
        self.insert(documents).await?;
        info!(path = %path.display(), documents = count, "Seeded in-memory vector store");
        Ok(count)
    }

    async fn embed_one(&self, text: String) -> RagResult<Vec<f32>> {
        self.embedder
            .embed(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, query: SearchQuery) -> RagResult<Vec<SearchResult>> {
        let query_vector = self.embed_one(query.text).await?;
        let entries = self.entries.read().await;

        let mut results = Vec::new();
        for entry in entries.iter() {
            if !matches_filter(&entry.document.metadata, &query.filter) {
                continue;
            }
            let score = cosine_similarity(&query_vector, &entry.vector)?;
            if score < query.min_score {
                continue;
            }
            results.push(SearchResult {
                text: entry.document.text.clone(),
                score,
                metadata: entry.document.metadata.clone(),
            });
        }

        // Stable: equal scores keep insertion order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(query.top_k as usize);

        debug!(
            candidates = entries.len(),
            results = results.len(),
            "In-memory search finished"
        );
        Ok(results)
    }

    async fn insert(&self, documents: Vec<Document>) -> RagResult<()> {
        let mut indexed = Vec::with_capacity(documents.len());

        for batch in documents.chunks(EMBED_BATCH_SIZE) {
            let texts = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed(texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            indexed.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(document, vector)| Entry { document, vector }),
            );
        }

        // Nothing becomes visible unless the whole batch embedded.
        self.entries.write().await.extend(indexed);
        Ok(())
    }
}

/// Every filter key must be present with an equal value.
fn matches_filter(metadata: &Metadata, filter: &Metadata) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> RagResult<f32> {
    if a.len() != b.len() {
        return Err(RagError::VectorStore(format!(
            "embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[derive(Debug, Deserialize)]
struct SeedRecord {
    text: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Reads `{"text": ..., "metadata": {...}}` records, one per line.
/// Blank lines are skipped.
pub async fn load_seed_file(path: impl AsRef<Path>) -> RagResult<Vec<Document>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        RagError::Config(format!("cannot read seed file {}: {}", path.display(), e))
    })?;

    parse_seed_lines(&raw).map_err(|(line, reason)| {
        RagError::Config(format!("{}:{}: {}", path.display(), line, reason))
    })
}

fn parse_seed_lines(raw: &str) -> Result<Vec<Document>, (usize, String)> {
    let mut documents = Vec::new();

    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: SeedRecord =
            serde_json::from_str(line).map_err(|e| (number + 1, e.to_string()))?;
        let metadata = metadata_from_json(record.metadata)
            .ok_or_else(|| (number + 1, "metadata must be an object".to_string()))?;

        documents.push(Document::new(record.text).with_metadata(metadata));
    }

    Ok(documents)
}
