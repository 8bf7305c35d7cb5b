//! Display ordering of finished clusters (the Cluster Ranker).
//!
//! Priority clusters come first, then newest representative first. The sort
//! is stable, so clusters with equal keys keep their build order.

use crate::models::{Article, Cluster};
use crate::settings::RankingSettings;
use std::cmp::Reverse;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ClusterRanker {
    priority_terms: Vec<String>,
}

impl ClusterRanker {
    pub fn new(settings: &RankingSettings) -> Self {
        Self {
            priority_terms: settings
                .priority_terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Whether the article's original or translated headline mentions a watch-list term.
    pub fn is_priority(&self, article: &Article) -> bool {
        let raw = article.raw_title.to_lowercase();
        let translated = article
            .translated_title
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.priority_terms
            .iter()
            .any(|t| raw.contains(t.as_str()) || translated.contains(t.as_str()))
    }

    /// Flag priority clusters and sort for display.
    pub fn rank(&self, mut clusters: Vec<Cluster>) -> Vec<Cluster> {
        for c in &mut clusters {
            c.is_priority = self.is_priority(c.representative());
        }
        clusters.sort_by_key(|c| (Reverse(c.is_priority), Reverse(c.representative().published_at)));
        debug!(
            clusters = clusters.len(),
            priority = clusters.iter().filter(|c| c.is_priority).count(),
            "Ranked clusters"
        );
        clusters
    }
}
