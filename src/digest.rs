//! Assembling the three-column digest from one batch of fetched articles.

use crate::cluster::ClusterBuilder;
use crate::entity::EntityGrouper;
use crate::intake::Intake;
use crate::models::{Article, Cluster, Column, Digest, RawArticle, Region};
use crate::oracle::EventOracle;
use crate::rank::ClusterRanker;
use crate::settings::{Settings, Strategy};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Runs intake, grouping, and ranking for every column.
#[derive(Debug, Clone)]
pub struct DigestBuilder {
    intake: Intake,
    strategy: Strategy,
    clusters: ClusterBuilder,
    entities: EntityGrouper,
    ranker: ClusterRanker,
    sources: Vec<String>,
    tz: FixedOffset,
}

impl DigestBuilder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            intake: Intake::new(settings),
            strategy: settings.strategy,
            clusters: ClusterBuilder::new(settings),
            entities: EntityGrouper::new(&settings.entity),
            ranker: ClusterRanker::new(&settings.ranking),
            sources: settings.sources.clone(),
            tz: settings.timezone(),
        }
    }

    /// Build the digest as of `now`.
    ///
    /// Columns are processed one after another in page order; an empty column
    /// is still emitted so the page layout stays fixed.
    #[instrument(level = "info", skip_all, fields(raw_count = raw.len(), strategy = ?self.strategy))]
    pub async fn build<O: EventOracle>(
        &self,
        raw: Vec<RawArticle>,
        oracle: &O,
        now: DateTime<FixedOffset>,
    ) -> Digest {
        let articles = self.intake.admit(raw, now);
        let source_counts = self.source_counts(&articles);

        let mut by_region: BTreeMap<Region, Vec<Article>> = BTreeMap::new();
        for a in articles {
            by_region.entry(a.region).or_default().push(a);
        }

        let mut columns = Vec::with_capacity(Region::ALL.len());
        for region in Region::ALL {
            let members = by_region.remove(&region).unwrap_or_default();
            columns.push(self.column(region, members, oracle).await);
        }

        info!(
            columns = columns.len(),
            clusters = columns.iter().map(|c| c.clusters.len()).sum::<usize>(),
            sources = source_counts.len(),
            "Digest assembled"
        );

        Digest {
            generated_at: now.with_timezone(&self.tz),
            columns,
            source_counts,
        }
    }

    #[instrument(level = "info", skip(self, articles, oracle), fields(articles = articles.len()))]
    async fn column<O: EventOracle>(&self, region: Region, articles: Vec<Article>, oracle: &O) -> Column {
        let article_count = articles.len();
        let grouped = match self.strategy {
            Strategy::Similarity => self.clusters.build(articles, oracle).await,
            Strategy::Entity => self.entities.group_by_entity(articles, oracle).await,
        };
        let clusters = self.ranker.rank(grouped);

        Column {
            region,
            title: region.title().to_string(),
            day_counts: day_counts(&clusters),
            article_count,
            clusters,
        }
    }

    fn source_counts(&self, articles: &[Article]) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> =
            self.sources.iter().map(|s| (s.clone(), 0)).collect();
        for a in articles {
            *counts.entry(a.source.clone()).or_default() += 1;
        }
        counts
    }
}

/// Number of clusters per local date of their representative.
fn day_counts(clusters: &[Cluster]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for c in clusters {
        *counts.entry(c.representative().published_at.date_naive()).or_default() += 1;
    }
    counts
}

/// Convenience wrapper around [`DigestBuilder`].
pub async fn build_digest<O: EventOracle>(
    raw: Vec<RawArticle>,
    settings: &Settings,
    oracle: &O,
    now: DateTime<FixedOffset>,
) -> Digest {
    DigestBuilder::new(settings).build(raw, oracle, now).await
}
