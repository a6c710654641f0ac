//! Semantic search over content embeddings

use crate::content::ContentType;
use crate::error::{Result, SdkError};
use crate::remote::RemoteStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const MATCH_FUNCTION: &str = "match_embeddings";
const SEARCH_FUNCTION: &str = "semantic-search";

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_LIMIT: u32 = 10;

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content_type: Option<ContentType>,
    pub similarity: f64,
}

impl SearchHit {
    /// Parse a result row; the id may come as `content_id` or `id`
    fn from_row(row: &Value) -> Option<Self> {
        let id = ["content_id", "id"].iter().find_map(|k| match row.get(*k)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })?;

        Some(Self {
            id,
            content_type: row
                .get("content_type")
                .and_then(Value::as_str)
                .and_then(|t| t.parse().ok()),
            similarity: row.get("similarity").and_then(Value::as_f64).unwrap_or(0.0),
        })
    }
}

#[derive(Clone)]
pub struct SemanticSearch {
    remote: Arc<dyn RemoteStore>,
}

impl SemanticSearch {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Nearest neighbours of an embedding via the `match_embeddings` function
    pub async fn match_embedding(
        &self,
        embedding: &[f32],
        content_type: Option<ContentType>,
        threshold: f64,
        limit: u32,
    ) -> Result<Vec<SearchHit>> {
        if embedding.is_empty() {
            return Err(SdkError::Validation("embedding is empty".into()));
        }
        validate(threshold, limit)?;

        let args = json!({
            "query_embedding": embedding,
            "content_type": content_type.map(|t| t.as_str()),
            "match_threshold": threshold,
            "match_limit": limit,
        });

        let response = self.remote.rpc(MATCH_FUNCTION, args).await?;
        Ok(collect_hits(&response, threshold, limit))
    }

    /// Free-text search through the `semantic-search` edge function, which
    /// embeds the query server-side
    pub async fn search_text(&self, query: &str, content_type: Option<ContentType>, limit: u32) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SdkError::Validation("search query is empty".into()));
        }
        validate(DEFAULT_THRESHOLD, limit)?;

        let body = json!({
            "query": query,
            "content_type": content_type.map(|t| t.as_str()),
            "limit": limit,
        });

        let response = self.remote.invoke_function(SEARCH_FUNCTION, body).await?;
        let results = response.get("results").unwrap_or(&response);
        Ok(collect_hits(results, 0.0, limit))
    }
}

fn validate(threshold: f64, limit: u32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(SdkError::Validation(format!(
            "match threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    if limit == 0 {
        return Err(SdkError::Validation("match limit must be positive".into()));
    }
    Ok(())
}

/// Hits at or above `threshold`, best first, at most `limit`
fn collect_hits(response: &Value, threshold: f64, limit: u32) -> Vec<SearchHit> {
    let Some(rows) = response.as_array() else {
        warn!("unexpected search response shape: {}", response);
        return Vec::new();
    };

    let mut hits: Vec<SearchHit> = rows
        .iter()
        .filter_map(SearchHit::from_row)
        .filter(|hit| hit.similarity >= threshold)
        .collect();
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(limit as usize);
    debug!(hits = hits.len(), "search complete");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockOp, MockStore};

    #[tokio::test]
    async fn test_match_embedding_ranks_and_filters() {
        let mock = Arc::new(MockStore::new());
        mock.respond(
            MATCH_FUNCTION,
            json!([
                {"content_id": "a", "content_type": "wiki", "similarity": 0.75},
                {"content_id": "b", "content_type": "forum", "similarity": 0.92},
                {"content_id": "c", "content_type": "forum", "similarity": 0.40},
            ]),
        );
        let search = SemanticSearch::new(mock);

        let hits = search.match_embedding(&[0.1, 0.2], None, 0.7, 5).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(hits[0].content_type, Some(ContentType::Forum));
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_remote() {
        let mock = Arc::new(MockStore::new());
        let search = SemanticSearch::new(mock.clone());

        assert!(search.match_embedding(&[0.1], None, 1.5, 5).await.is_err());
        assert!(search.match_embedding(&[0.1], None, 0.5, 0).await.is_err());
        assert!(search.match_embedding(&[], None, 0.5, 5).await.is_err());
        assert!(search.search_text("  ", None, 5).await.is_err());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_text_reads_results_envelope() {
        let mock = Arc::new(MockStore::new());
        mock.respond(
            SEARCH_FUNCTION,
            json!({"results": [{"id": 12, "content_type": "research", "similarity": 0.8}]}),
        );
        let search = SemanticSearch::new(mock.clone());

        let hits = search.search_text("stoicism", Some(ContentType::Research), 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "12");

        mock.fail(MockOp::Function, SEARCH_FUNCTION);
        assert!(search.search_text("stoicism", None, 3).await.is_err());
    }
}
