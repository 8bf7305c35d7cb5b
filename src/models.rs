//! Data models for headlines, story clusters, and the assembled digest.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`RawArticle`]: A feed item as handed over by the fetch layer
//! - [`Article`]: A normalized headline with a parsed timestamp and identity link
//! - [`Cluster`]: A group of articles judged to describe the same story or company
//! - [`Digest`]: The three-column output consumed by the page renderer
//!
//! Articles are identified by their `link` everywhere (cluster membership,
//! bookmarks, hide state), so two records with the same canonical link are
//! never both admitted into a run.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which page column a feed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// International outlets and long-form analysis.
    #[default]
    Global,
    /// Japanese and Korean outlets.
    JapanKorea,
    /// Taiwanese outlets.
    Taiwan,
}

impl Region {
    /// Every column in page order.
    pub const ALL: [Region; 3] = [Region::Global, Region::JapanKorea, Region::Taiwan];

    /// Column heading shown above the river.
    pub fn title(&self) -> &'static str {
        match self {
            Region::Global => "Global & Strategy",
            Region::JapanKorea => "Japan/Korea Tech",
            Region::Taiwan => "Taiwan IT & Biz",
        }
    }
}

/// A feed item as delivered by the fetch layer, before any cleanup.
///
/// # Fields
///
/// * `title` - The headline as published, in its source language
/// * `link` - The article URL; becomes the identity key after canonicalization
/// * `published` - Publication time as text; several feed formats are accepted
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawArticle {
    /// The headline as published.
    pub title: String,
    /// The article URL.
    pub link: String,
    /// Human-readable outlet name.
    #[serde(default)]
    pub source: String,
    /// Publication time as found in the feed.
    #[serde(default)]
    pub published: Option<String>,
    /// Short category label such as a language marker or "analysis".
    #[serde(default)]
    pub tag: Option<String>,
    /// Column the feed is configured for.
    #[serde(default)]
    pub region: Region,
    /// Headline translation supplied upstream, if any.
    #[serde(default)]
    pub translated_title: Option<String>,
}

/// A normalized headline ready for clustering.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// Headline in its source language, with literal site boilerplate removed.
    pub raw_title: String,
    /// Canonical URL; unique within a run.
    pub link: String,
    /// Human-readable outlet name.
    pub source: String,
    /// Publication time in the reference timezone.
    pub published_at: DateTime<FixedOffset>,
    /// Short category label.
    pub tag: Option<String>,
    /// Column this article is shown in.
    pub region: Region,
    /// Organization assigned by the entity grouper.
    pub company: Option<String>,
    /// Translated headline, from upstream or from the entity grouper.
    pub translated_title: Option<String>,
}

impl Article {
    /// The headline to show: the translation when one exists, else the cleaned original.
    pub fn display_title(&self) -> &str {
        self.translated_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.raw_title)
    }
}

/// A set of articles judged to describe the same story or company.
///
/// `members[0]` is always the representative; the rest are secondary mentions
/// in the order they joined.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Cluster {
    /// Members, representative first.
    pub members: Vec<Article>,
    /// Set by the ranker when the representative matches the watch-list.
    #[serde(default)]
    pub is_priority: bool,
    /// Shared organization when the cluster came from entity grouping.
    #[serde(default)]
    pub company: Option<String>,
}

impl Cluster {
    /// Open a new cluster with `article` as its representative.
    pub fn singleton(article: Article) -> Self {
        Self {
            members: vec![article],
            is_priority: false,
            company: None,
        }
    }

    /// The article shown as the cluster headline.
    pub fn representative(&self) -> &Article {
        &self.members[0]
    }

    /// Secondary mentions listed under the headline.
    pub fn secondary(&self) -> &[Article] {
        &self.members[1..]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One page column with its ranked clusters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Column {
    pub region: Region,
    /// Heading shown above the column.
    pub title: String,
    /// Clusters in display order.
    pub clusters: Vec<Cluster>,
    /// Number of articles across all clusters in this column.
    pub article_count: usize,
    /// Local date of each representative -> number of clusters headed that day.
    pub day_counts: BTreeMap<NaiveDate, usize>,
}

/// The whole page: three columns plus per-source statistics.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Digest {
    /// When the digest was assembled, in the reference timezone.
    pub generated_at: DateTime<FixedOffset>,
    /// Columns in page order.
    pub columns: Vec<Column>,
    /// Article count per source after intake.
    pub source_counts: BTreeMap<String, usize>,
}
