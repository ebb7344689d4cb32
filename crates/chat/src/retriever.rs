//! Knowledge retrieval, the two-stage recall/precision pipeline.
//!
//! Stage one is the store's lexical search: cheap, high recall, low
//! precision, no score. Stage two runs the [`RelevanceScorer`] over every
//! candidate, one provider call at a time, then filters and ranks.
//!
//! Sequential per-candidate scoring is the dominant latency cost of a
//! turn. Callers that need the turn to survive a broken provider handle
//! the error themselves (the engine degrades to an empty knowledge list).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_core::error::Error;
use mnemo_core::store::ChatStore;
use serde::Serialize;
use tracing::debug;

use crate::scorer::RelevanceScorer;

/// Candidates scoring at or below this are discarded.
pub const RELEVANCE_THRESHOLD: f64 = 0.3;

/// A knowledge entry that survived filtering, ready for prompt rendering.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeHit {
    pub content: String,
    pub relevance: f64,
    pub created_at: DateTime<Utc>,
}

/// Retrieves relevance-filtered, relevance-sorted knowledge for a query.
pub struct KnowledgeRetriever {
    store: Arc<dyn ChatStore>,
    scorer: RelevanceScorer,
}

impl KnowledgeRetriever {
    pub fn new(store: Arc<dyn ChatStore>, scorer: RelevanceScorer) -> Self {
        Self { store, scorer }
    }

    /// Retrieve knowledge relevant to `query`.
    ///
    /// Store and provider failures propagate as retrieval errors; an empty
    /// result list is not an error.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<KnowledgeHit>, Error> {
        let candidates = self.store.search_knowledge(query).await?;
        debug!(candidates = candidates.len(), "Lexical search complete");

        let mut hits = Vec::new();
        // One scoring call per candidate, in store order.
        for candidate in candidates {
            let relevance = self.scorer.score(query, &candidate.content).await?;
            if relevance > RELEVANCE_THRESHOLD {
                hits.push(KnowledgeHit {
                    content: candidate.content,
                    relevance,
                    created_at: candidate.created_at,
                });
            }
        }

        // Stable sort: equal scores keep the store's candidate order.
        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(hits = hits.len(), "Knowledge retrieval complete");
        Ok(hits)
    }
}
