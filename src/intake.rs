//! Turning fetched feed items into clusterable articles.
//!
//! Intake runs before any clustering and never rejects a whole batch:
//! - links are canonicalized and the first article per link wins
//! - timestamps are parsed and converted to the reference timezone; anything
//!   unparseable becomes "now" and the article is still kept
//! - titles get the display cleanup
//! - with a window configured, articles older than the window are dropped
//!
//! Records without a link are skipped, since the link is the article's identity.

use crate::models::{Article, RawArticle};
use crate::normalize::Normalizer;
use crate::settings::Settings;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};
use url::Url;

static TRACKING_QUERY_PREFIXES: &[&str] = &["utm_"];
static TRACKING_QUERY_KEYS: &[&str] = &["fbclid", "gclid", "ocid", "cmpid"];

/// Naive layouts some feeds use; interpreted in the reference timezone.
static NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Canonical identity for an article URL.
///
/// Drops the fragment and tracking parameters; the `url` crate lower-cases
/// the host. Unparseable links are kept verbatim (trimmed). Empty links yield `None`.
pub fn canonical_link(link: &str) -> Option<String> {
    let raw = link.trim();
    if raw.is_empty() {
        return None;
    }
    let Ok(mut parsed) = Url::parse(raw) else {
        return Some(raw.to_string());
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            let lk = key.to_lowercase();
            !TRACKING_QUERY_KEYS.contains(&lk.as_str())
                && !TRACKING_QUERY_PREFIXES.iter().any(|p| lk.starts_with(p))
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Parse a feed timestamp into the reference timezone.
pub fn parse_timestamp(text: &str, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(tz));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(tz));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return tz.from_local_datetime(&naive).single();
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).single())
}

/// Normalizes fetched records into [`Article`]s.
#[derive(Debug, Clone)]
pub struct Intake {
    normalizer: Normalizer,
    tz: FixedOffset,
    window: Option<Duration>,
}

impl Intake {
    pub fn new(settings: &Settings) -> Self {
        Self {
            normalizer: Normalizer::new(&settings.normalizer),
            tz: settings.timezone(),
            window: settings
                .window_hours
                .and_then(|h| i64::try_from(h).ok())
                .and_then(Duration::try_hours),
        }
    }

    /// Admit `raw` records as of `now`, preserving input order.
    #[instrument(level = "info", skip_all, fields(raw_count = raw.len()))]
    pub fn admit(&self, raw: Vec<RawArticle>, now: DateTime<FixedOffset>) -> Vec<Article> {
        let total = raw.len();
        let now = now.with_timezone(&self.tz);
        let cutoff = self.window.and_then(|w| now.checked_sub_signed(w));

        let normalized: Vec<Article> = raw
            .into_iter()
            .filter_map(|r| self.normalize(r, now))
            .collect();
        let linked = normalized.len();

        let unique: Vec<Article> = normalized.into_iter().unique_by(|a| a.link.clone()).collect();
        if unique.len() < linked {
            warn!(duplicates = linked - unique.len(), "Dropped articles sharing a canonical link");
        }

        let articles: Vec<Article> = unique
            .into_iter()
            .filter(|a| match cutoff {
                Some(cutoff) if a.published_at < cutoff => {
                    debug!(link = %a.link, published_at = %a.published_at, "Outside window; dropped");
                    false
                }
                _ => true,
            })
            .collect();

        info!(
            received = total,
            admitted = articles.len(),
            dropped = total - articles.len(),
            "Intake complete"
        );
        articles
    }

    fn normalize(&self, raw: RawArticle, now: DateTime<FixedOffset>) -> Option<Article> {
        let Some(link) = canonical_link(&raw.link) else {
            warn!(title = %raw.title, source = %raw.source, "Article has no link; skipped");
            return None;
        };

        let published_at = match raw.published.as_deref().and_then(|p| parse_timestamp(p, &self.tz)) {
            Some(ts) => ts,
            None => {
                warn!(%link, published = ?raw.published, "Missing or unparseable timestamp; using now");
                now
            }
        };

        let translated_title = raw
            .translated_title
            .map(|t| self.normalizer.clean_display(&t))
            .filter(|t| !t.is_empty());

        Some(Article {
            raw_title: self.normalizer.clean_display(&raw.title),
            link,
            source: raw.source.trim().to_string(),
            published_at,
            tag: raw.tag.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            region: raw.region,
            company: None,
            translated_title,
        })
    }
}
