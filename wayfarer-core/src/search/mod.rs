//! Search collaborators used by producer agents to ground their picks

use async_trait::async_trait;

use crate::error::Result;
use crate::model::SearchResult;

pub mod brave;

pub use brave::BraveSearch;

/// Which search endpoint a producer consults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Videos,
    Web,
}

/// Trait for search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for videos matching `query`
    async fn search_videos(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// General web search
    async fn search_web(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Run a search and degrade any failure to an empty result list.
pub async fn search(provider: &dyn SearchProvider, kind: SearchKind, query: &str) -> Vec<SearchResult> {
    let outcome = match kind {
        SearchKind::Videos => provider.search_videos(query).await,
        SearchKind::Web => provider.search_web(query).await,
    };
    match outcome {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(?kind, query, error = %e, "Search failed");
            Vec::new()
        }
    }
}

/// Render results as the bullet list shown to the model on the refinement call.
pub fn format_results(results: &[SearchResult], limit: usize) -> String {
    results
        .iter()
        .take(limit)
        .map(|r| format!("- {}: {} ({})", r.title, r.description, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WayfarerError;

    struct BrokenSearch;

    #[async_trait]
    impl SearchProvider for BrokenSearch {
        async fn search_videos(&self, _query: &str) -> Result<Vec<SearchResult>> {
            Err(WayfarerError::Search("503".to_string()))
        }

        async fn search_web(&self, _query: &str) -> Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                title: "Only".to_string(),
                ..Default::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_search_degrades_to_empty() {
        assert!(search(&BrokenSearch, SearchKind::Videos, "q").await.is_empty());
        assert_eq!(search(&BrokenSearch, SearchKind::Web, "q").await.len(), 1);
    }

    #[test]
    fn test_format_results_respects_limit() {
        let results: Vec<SearchResult> = (0..3)
            .map(|i| SearchResult {
                title: format!("T{}", i),
                description: format!("D{}", i),
                url: format!("https://example.com/{}", i),
            })
            .collect();

        let text = format_results(&results, 2);
        assert_eq!(
            text,
            "- T0: D0 (https://example.com/0)\n- T1: D1 (https://example.com/1)"
        );
        assert_eq!(format_results(&[], 5), "");
    }
}
