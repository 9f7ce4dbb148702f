use serde::Serialize;

use crate::catalog::similarity::{MatchingBlocksRatio, SimilarityMetric};
use crate::catalog::CatalogIndex;
use crate::domain::product::CatalogItem;

/// Score given to items whose name or description contains the query.
pub const SUBSTRING_SCORE: f64 = 2.0;
/// Hits must score strictly above this to be returned.
pub const RELEVANCE_THRESHOLD: f64 = 0.4;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub item: CatalogItem,
    pub score: f64,
}

pub struct SearchEngine<M = MatchingBlocksRatio> {
    metric: M,
}

impl Default for SearchEngine<MatchingBlocksRatio> {
    fn default() -> Self {
        Self::new(MatchingBlocksRatio)
    }
}

impl<M: SimilarityMetric> SearchEngine<M> {
    pub fn new(metric: M) -> Self {
        Self { metric }
    }

    pub fn metric_name(&self) -> &'static str {
        self.metric.name()
    }

    /// Ranks catalog items against a free-text query, best first. Equal
    /// scores keep catalog order.
    pub fn search(&self, index: &CatalogIndex, query: &str) -> Vec<SearchHit> {
        let query = query.trim().to_lowercase();

        let mut hits: Vec<SearchHit> = index
            .items()
            .iter()
            .filter_map(|item| {
                let score = self.score(&query, item);
                (score > RELEVANCE_THRESHOLD).then(|| SearchHit { item: item.clone(), score })
            })
            .collect();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits
    }

    fn score(&self, query: &str, item: &CatalogItem) -> f64 {
        let name = item.name.to_lowercase();
        let description = item.description.as_deref().unwrap_or_default().to_lowercase();

        if name.contains(query) || description.contains(query) {
            return SUBSTRING_SCORE;
        }

        let by_name = self.metric.similarity(query, &name);
        let by_description = self.metric.similarity(query, &description);
        by_name.max(by_description)
    }
}
