//! Clustering settings loaded from YAML.
//!
//! Every section is optional; missing keys fall back to the built-in defaults,
//! so an empty file is a valid configuration. The loaded [`Settings`] value is
//! immutable and handed explicitly to each stage of the pipeline.
//!
//! # Example
//!
//! ```yaml
//! strategy: similarity
//! utc_offset_hours: 8
//! similarity:
//!   high_threshold: 0.65
//!   low_threshold: 0.30
//!   keyword_bonus: 0.18
//!   keywords: ["nvidia", "tsmc", "台積電"]
//! ranking:
//!   priority_terms: ["openai", "apple"]
//! entity:
//!   batch_size: 20
//! ```

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// How articles are grouped into clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Incremental title-similarity clustering with oracle adjudication.
    #[default]
    Similarity,
    /// Batch organization tagging, merged globally by company name.
    Entity,
}

/// Which candidate cluster an article joins when several qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Highest scoring qualifying cluster; ties go to the older cluster.
    #[default]
    Best,
    /// First qualifying cluster in the order clusters were opened.
    First,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizerSettings {
    /// Clickbait markers stripped before comparing titles.
    pub noise_words: Vec<String>,
    /// Site boilerplate removed from every title, including the displayed one.
    pub junk_phrases: Vec<String>,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            noise_words: [
                "breaking", "exclusive", "must-read", "must read", "live", "快訊",
                "獨家", "必看", "直播", "速報", "独占", "속보", "단독",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            junk_phrases: [
                "Send tips",
                "Share this article",
                "Click to share",
                "分享此文",
                "點我看更多",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimilaritySettings {
    /// Scores at or above this are a certain match.
    pub high_threshold: f64,
    /// Scores at or above this (and below high) go to the oracle.
    pub low_threshold: f64,
    /// Added when both titles mention the same watch-list keyword.
    pub keyword_bonus: f64,
    /// Watch-list for the keyword bonus, matched case-insensitively.
    pub keywords: Vec<String>,
    pub match_policy: MatchPolicy,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            high_threshold: 0.65,
            low_threshold: 0.30,
            keyword_bonus: 0.18,
            keywords: [
                "nvidia", "tsmc", "台積電", "apple", "google", "microsoft", "openai", "samsung",
                "intel", "amd", "amazon", "sony", "softbank", "鴻海", "聯發科",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            match_policy: MatchPolicy::Best,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EntitySettings {
    /// Titles sent to the oracle per request.
    pub batch_size: usize,
    /// Pause before each batch after the first.
    pub batch_delay_ms: u64,
    /// Batches in flight at once.
    pub concurrency: usize,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_delay_ms: 1000,
            concurrency: 1,
        }
    }
}

impl EntitySettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RankingSettings {
    /// Watch-list that promotes a cluster to the top of its column.
    pub priority_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleSettings {
    /// When false the oracle always answers "no" / "no entity".
    pub enabled: bool,
    /// Upper bound on a single oracle round-trip.
    pub timeout_secs: u64,
    /// awful_aj template used for the same-event question.
    pub pairwise_template: String,
    /// awful_aj template used for batch organization tagging.
    pub entity_template: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            pairwise_template: "same_event".to_string(),
            entity_template: "company_tagger".to_string(),
        }
    }
}

impl OracleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete, validated configuration for one digest run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub strategy: Strategy,
    /// Offset of the reference timezone all timestamps are converted to.
    pub utc_offset_hours: i32,
    /// Drop articles older than this many hours, if set.
    pub window_hours: Option<u64>,
    /// Outlets expected in the run; reported with a zero count when silent.
    pub sources: Vec<String>,
    pub normalizer: NormalizerSettings,
    pub similarity: SimilaritySettings,
    pub entity: EntitySettings,
    pub ranking: RankingSettings,
    pub oracle: OracleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Similarity,
            utc_offset_hours: 8,
            window_hours: None,
            sources: Vec::new(),
            normalizer: NormalizerSettings::default(),
            similarity: SimilaritySettings::default(),
            entity: EntitySettings::default(),
            ranking: RankingSettings::default(),
            oracle: OracleSettings::default(),
        }
    }
}

/// Longest intake window accepted: one hundred years.
pub const MAX_WINDOW_HOURS: u64 = 24 * 365 * 100;

/// A setting outside its allowed range.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidSettings(pub String);

impl fmt::Display for InvalidSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid settings: {}", self.0)
    }
}

impl Error for InvalidSettings {}

impl Settings {
    /// Parse settings from YAML text and validate them.
    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn Error>> {
        let settings: Settings = if text.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(text)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Read and validate a YAML settings file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let settings = Self::from_yaml(&text)?;
        info!(
            strategy = ?settings.strategy,
            high = settings.similarity.high_threshold,
            low = settings.similarity.low_threshold,
            "Loaded clustering settings"
        );
        Ok(settings)
    }

    /// Check ranges and orderings that the clustering stages rely on.
    pub fn validate(&self) -> Result<(), InvalidSettings> {
        let s = &self.similarity;
        for (name, v) in [("high_threshold", s.high_threshold), ("low_threshold", s.low_threshold)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(InvalidSettings(format!("{name} must be within [0, 1], got {v}")));
            }
        }
        if s.low_threshold > s.high_threshold {
            return Err(InvalidSettings(format!(
                "low_threshold ({}) must not exceed high_threshold ({})",
                s.low_threshold, s.high_threshold
            )));
        }
        if s.keyword_bonus < 0.0 {
            return Err(InvalidSettings("keyword_bonus must not be negative".to_string()));
        }
        if self.entity.batch_size == 0 {
            return Err(InvalidSettings("entity.batch_size must be at least 1".to_string()));
        }
        if self.entity.concurrency == 0 {
            return Err(InvalidSettings("entity.concurrency must be at least 1".to_string()));
        }
        if let Some(h) = self.window_hours.filter(|h| !(1..=MAX_WINDOW_HOURS).contains(h)) {
            return Err(InvalidSettings(format!(
                "window_hours must be within 1..={MAX_WINDOW_HOURS}, got {h}"
            )));
        }
        if self.reference_offset().is_none() {
            return Err(InvalidSettings(format!(
                "utc_offset_hours must be within ±14, got {}",
                self.utc_offset_hours
            )));
        }
        Ok(())
    }

    /// The reference timezone, or `None` when the offset is out of range.
    pub fn reference_offset(&self) -> Option<FixedOffset> {
        if self.utc_offset_hours.abs() > 14 {
            return None;
        }
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
    }

    /// The reference timezone; falls back to UTC for unvalidated settings.
    pub fn timezone(&self) -> FixedOffset {
        self.reference_offset().unwrap_or_else(|| Utc.fix())
    }
}
