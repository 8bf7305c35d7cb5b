//! Incremental similarity clustering (the Cluster Builder).
//!
//! Articles are visited oldest first. Each one is compared against the
//! representative of every open cluster:
//!
//! | Score                     | Decision                                  |
//! |---------------------------|-------------------------------------------|
//! | `>= high_threshold`       | certain match                             |
//! | `low..high`               | borderline: ask the oracle                |
//! | `< low_threshold`         | no match                                  |
//!
//! With [`MatchPolicy::Best`] the highest certain match wins (ties go to the
//! older cluster); failing that, borderline clusters are put to the oracle in
//! descending score order and the first YES wins. [`MatchPolicy::First`] scans
//! clusters in the order they were opened and takes the first that qualifies.
//!
//! Representatives never change: because input is sorted by publication time
//! and matches are appended, `members[0]` is always the earliest article.
//! Oracle calls are strictly sequential so assignment is deterministic for a
//! deterministic oracle.

use crate::models::{Article, Cluster};
use crate::normalize::Normalizer;
use crate::oracle::EventOracle;
use crate::settings::{MatchPolicy, Settings};
use crate::similarity::SimilarityScorer;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Builds story clusters from a batch of articles.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    normalizer: Normalizer,
    scorer: SimilarityScorer,
    high_threshold: f64,
    low_threshold: f64,
    policy: MatchPolicy,
}

/// A cluster still accepting members, keyed by its representative's comparable title.
struct OpenCluster {
    key: String,
    cluster: Cluster,
}

impl ClusterBuilder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            normalizer: Normalizer::new(&settings.normalizer),
            scorer: SimilarityScorer::new(&settings.similarity),
            high_threshold: settings.similarity.high_threshold,
            low_threshold: settings.similarity.low_threshold,
            policy: settings.similarity.match_policy,
        }
    }

    /// Partition `articles` into clusters.
    ///
    /// Every input article ends up in exactly one cluster. Clusters are
    /// returned in the order they were opened.
    #[instrument(level = "info", skip_all, fields(article_count = articles.len()))]
    pub async fn build<O: EventOracle>(&self, mut articles: Vec<Article>, oracle: &O) -> Vec<Cluster> {
        let t0 = Instant::now();
        articles.sort_by_key(|a| a.published_at);

        let total = articles.len();
        let mut open: Vec<OpenCluster> = Vec::new();
        let mut oracle_calls = 0usize;

        for article in articles {
            let key = self.normalizer.normalize_compare(&article.raw_title);
            let target = match self.policy {
                MatchPolicy::Best => self.best_match(&key, &article, &open, oracle, &mut oracle_calls).await,
                MatchPolicy::First => self.first_match(&key, &article, &open, oracle, &mut oracle_calls).await,
            };
            match target {
                Some(idx) => {
                    debug!(
                        title = %article.raw_title,
                        representative = %open[idx].cluster.representative().raw_title,
                        "Joined existing cluster"
                    );
                    open[idx].cluster.members.push(article);
                }
                None => open.push(OpenCluster {
                    key,
                    cluster: Cluster::singleton(article),
                }),
            }
        }

        let clusters: Vec<Cluster> = open.into_iter().map(|o| o.cluster).collect();
        info!(
            articles = total,
            clusters = clusters.len(),
            merged = total - clusters.len(),
            oracle_calls,
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Similarity clustering complete"
        );
        clusters
    }

    async fn best_match<O: EventOracle>(
        &self,
        key: &str,
        article: &Article,
        open: &[OpenCluster],
        oracle: &O,
        oracle_calls: &mut usize,
    ) -> Option<usize> {
        let scores: Vec<(usize, f64)> = open
            .iter()
            .enumerate()
            .map(|(idx, o)| (idx, self.scorer.score(&o.key, key)))
            .collect();

        let mut certain: Option<(usize, f64)> = None;
        for &(idx, score) in &scores {
            if score >= self.high_threshold && certain.is_none_or(|(_, best)| score > best) {
                certain = Some((idx, score));
            }
        }
        if let Some((idx, score)) = certain {
            debug!(score, idx, "Certain match");
            return Some(idx);
        }

        let mut borderline: Vec<(usize, f64)> = scores
            .into_iter()
            .filter(|&(_, s)| s >= self.low_threshold)
            .collect();
        // stable: equal scores keep cluster order
        borderline.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (idx, score) in borderline {
            *oracle_calls += 1;
            let rep = open[idx].cluster.representative();
            if oracle.same_event(&rep.raw_title, &article.raw_title).await {
                debug!(score, idx, "Borderline match confirmed by oracle");
                return Some(idx);
            }
            debug!(score, idx, "Borderline match rejected");
        }
        None
    }

    async fn first_match<O: EventOracle>(
        &self,
        key: &str,
        article: &Article,
        open: &[OpenCluster],
        oracle: &O,
        oracle_calls: &mut usize,
    ) -> Option<usize> {
        for (idx, o) in open.iter().enumerate() {
            let score = self.scorer.score(&o.key, key);
            if score >= self.high_threshold {
                debug!(score, idx, "Certain match");
                return Some(idx);
            }
            if score >= self.low_threshold {
                *oracle_calls += 1;
                if oracle
                    .same_event(&o.cluster.representative().raw_title, &article.raw_title)
                    .await
                {
                    debug!(score, idx, "Borderline match confirmed by oracle");
                    return Some(idx);
                }
            }
        }
        None
    }
}
