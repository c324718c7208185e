use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::error::{RagError, RagResult};
use crate::models::{InsertTextsInput, SearchQuery, SearchResult};
use crate::provider::VectorStore;

/// Validated entry point of the vector store service.
///
/// Requests are checked before they reach the backing [`VectorStore`], and
/// a search answering with more than `top_k` results is treated as a store
/// failure rather than truncated.
#[derive(Clone)]
pub struct TextIndex {
    store: Arc<dyn VectorStore>,
}

impl TextIndex {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn insert_texts(&self, input: InsertTextsInput) -> RagResult<()> {
        input.validate()?;

        let count = input.texts.len();
        self.store.insert(input.texts).await?;

        info!(count, "Indexed texts");
        Ok(())
    }

    pub async fn search_text(&self, query: SearchQuery) -> RagResult<Vec<SearchResult>> {
        query.validate()?;

        let top_k = query.top_k as usize;
        let results = self.store.search(query).await?;
        if results.len() > top_k {
            return Err(RagError::VectorStore(format!(
                "store returned {} results for top_k {}",
                results.len(),
                top_k
            )));
        }

        debug!(results = results.len(), "Search answered");
        Ok(results)
    }
}
