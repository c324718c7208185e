use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::{RagError, RagResult};
use crate::models::{RerankQuery, RerankResult};
use crate::provider::Reranker;

/// Cross-encoder served behind a `/rerank` HTTP endpoint
pub struct HttpReranker {
    client: Client,
    config: RerankerConfig,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    query: &'a str,
    top_n: u32,
    documents: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResponseResult {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    pub fn new(config: RerankerConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: RerankerConfig) -> Self {
        Self { client, config }
    }

    /// Sends a throwaway request so a misconfigured service fails at startup
    /// rather than on the first query.
    pub async fn probe(&self) -> RagResult<()> {
        self.send("", &[String::new()], 1).await.map(|_| ())
    }

    async fn send(&self, query: &str, documents: &[String], top_n: u32) -> RagResult<RerankResponse> {
        let request = RerankRequest {
            model: self.config.model.as_deref(),
            query,
            top_n,
            documents,
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Reranker(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Reranker(format!(
                "reranker got status code {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::Reranker(format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: RerankQuery) -> RagResult<Vec<RerankResult>> {
        let response = self
            .send(&query.query, &query.documents, query.top_n)
            .await?;

        attach_documents(response.results, &query.documents)
    }
}

/// The service answers with indices only; the text comes from the request.
fn attach_documents(
    results: Vec<RerankResponseResult>,
    documents: &[String],
) -> RagResult<Vec<RerankResult>> {
    results
        .into_iter()
        .map(|result| {
            let document = documents.get(result.index).ok_or_else(|| {
                RagError::Reranker(format!(
                    "result index {} out of range for {} documents",
                    result.index,
                    documents.len()
                ))
            })?;
            Ok(RerankResult {
                index: result.index,
                document: document.clone(),
                score: result.relevance_score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_unset_model() {
        let documents = vec!["a".to_string()];
        let request = RerankRequest {
            model: None,
            query: "q",
            top_n: 1,
            documents: &documents,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"query": "q", "top_n": 1, "documents": ["a"]})
        );
    }

    #[test]
    fn test_attach_documents_by_index() {
        let response: RerankResponse = serde_json::from_value(serde_json::json!({
            "results": [
                {"index": 1, "relevance_score": 0.9},
                {"index": 0, "relevance_score": 0.2},
            ]
        }))
        .unwrap();
        let documents = vec!["first".to_string(), "second".to_string()];

        let results = attach_documents(response.results, &documents).unwrap();
        assert_eq!(results[0].document, "second");
        assert_eq!(results[0].index, 1);
        assert_eq!(results[1].document, "first");
        assert_eq!(results[1].score, 0.2);
    }

    #[test]
    fn test_out_of_range_index_fails() {
        let results = vec![RerankResponseResult {
            index: 3,
            relevance_score: 1.0,
        }];
        let err = attach_documents(results, &["only".to_string()]).unwrap_err();
        assert!(matches!(err, RagError::Reranker(msg) if msg.contains("out of range")));
    }
}
