//! Headline cleanup for display and for comparison.
//!
//! Two distinct cleanups are provided:
//! - [`Normalizer::clean_display`] removes literal site boilerplate and tidies
//!   spacing; the result is what readers see.
//! - [`Normalizer::normalize_compare`] additionally folds compatibility forms
//!   (NFKC), strips URLs, bracketed source tags, clickbait markers, case, and
//!   every whitespace character, producing the *comparable title* used by the
//!   similarity scorer.
//!
//! Neither cleanup can fail; an all-noise headline simply becomes empty.

use crate::settings::NormalizerSettings;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());

/// `[...]`, `【...】`, `［...］` and `〔...〕` source tags.
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]]*\]|【[^【】]*】|［[^［］]*］|〔[^〔〕]*〕").unwrap());

static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Title cleanup compiled from [`NormalizerSettings`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    junk_phrases: Vec<String>,
    noise: Option<Regex>,
}

impl Normalizer {
    pub fn new(settings: &NormalizerSettings) -> Self {
        let junk_phrases = settings
            .junk_phrases
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            junk_phrases,
            noise: noise_pattern(&settings.noise_words),
        }
    }

    /// Remove literal boilerplate and collapse runs of whitespace.
    pub fn clean_display(&self, raw_title: &str) -> String {
        let mut title = raw_title.to_string();
        for phrase in &self.junk_phrases {
            title = title.replace(phrase.as_str(), " ");
        }
        SPACES_RE.replace_all(&title, " ").trim().to_string()
    }

    /// Produce the comparable form of a headline.
    ///
    /// Removal can expose new matches (two fragments joining into a noise word
    /// once the space between them is gone), so the passes are repeated until
    /// the title stops changing. Each pass only deletes characters, which makes
    /// the loop terminate and the result idempotent.
    pub fn normalize_compare(&self, raw_title: &str) -> String {
        let mut current = self.compare_pass(raw_title);
        loop {
            let next = self.compare_pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn compare_pass(&self, title: &str) -> String {
        // NFKC folds full-width Latin and digits ("ＴＳＭＣ", "２０２６") to ASCII.
        let mut t = title.nfkc().collect::<String>().to_lowercase();
        t = URL_RE.replace_all(&t, " ").into_owned();
        t = TAG_RE.replace_all(&t, " ").into_owned();
        for phrase in &self.junk_phrases {
            t = t.replace(&phrase.to_lowercase(), " ");
        }
        if let Some(noise) = &self.noise {
            t = noise.replace_all(&t, " ").into_owned();
        }
        t.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerSettings::default())
    }
}

/// One alternation over all noise words. ASCII words get word boundaries so
/// "live" does not eat "delivers"; CJK markers are matched literally.
fn noise_pattern(words: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let escaped = regex::escape(&w.to_lowercase());
            if w.is_ascii() {
                format!(r"\b{escaped}\b")
            } else {
                escaped
            }
        })
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    let pattern = format!("(?i)(?:{})", alternatives.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "Noise word pattern failed to compile; noise words ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn test_clean_display_removes_boilerplate_keeps_spacing() {
        let n = normalizer();
        assert_eq!(
            n.clean_display("Apple ships M5 MacBook Pro   Send tips"),
            "Apple ships M5 MacBook Pro"
        );
        assert_eq!(n.clean_display("  Breaking: TSMC raises capex "), "Breaking: TSMC raises capex");
    }

    #[test]
    fn test_normalize_compare_strips_whitespace_and_case() {
        let n = normalizer();
        assert_eq!(n.normalize_compare("Nvidia Launches  New GPU"), "nvidialaunchesnewgpu");
        assert_eq!(n.normalize_compare("台積電　擴產"), "台積電擴產");
    }

    #[test]
    fn test_normalize_compare_strips_urls_and_tags() {
        let n = normalizer();
        assert_eq!(
            n.normalize_compare("[TechNews] OpenAI raises funding https://t.co/abc"),
            "openairaisesfunding"
        );
        assert_eq!(n.normalize_compare("【獨家】鴻海 AI 伺服器出貨"), "鴻海ai伺服器出貨");
        assert_eq!(n.normalize_compare("［速報］ソニー決算"), "ソニー決算");
    }

    #[test]
    fn test_normalize_compare_folds_full_width_latin() {
        let n = normalizer();
        assert_eq!(n.normalize_compare("ＴＳＭＣ　ＡＩ需求強勁"), "tsmcai需求強勁");
        assert_eq!(
            n.normalize_compare("ＴＳＭＣ　ＡＩ需求強勁"),
            n.normalize_compare("TSMC AI需求強勁")
        );
        assert_eq!(n.normalize_compare("ｉＰｈｏｎｅ　１７発表"), "iphone17発表");
    }

    #[test]
    fn test_normalize_compare_strips_noise_words() {
        let n = normalizer();
        assert_eq!(n.normalize_compare("BREAKING: Intel cuts jobs"), ":intelcutsjobs");
        assert_eq!(n.normalize_compare("Exclusive - Samsung HBM4 deal"), "-samsunghbm4deal");
        assert_eq!(n.normalize_compare("速報 ソフトバンク決算"), "ソフトバンク決算");
    }

    #[test]
    fn test_noise_words_respect_word_boundaries() {
        let n = normalizer();
        assert_eq!(n.normalize_compare("Amazon delivers drones"), "amazondeliversdrones");
        assert_eq!(n.normalize_compare("Live: Apple event"), ":appleevent");
    }

    #[test]
    fn test_normalize_compare_is_idempotent() {
        let n = normalizer();
        let inputs = [
            "Nvidia launches new GPU",
            "foo-li ve [x] bar",
            "【獨家】 Breaking news https://example.com live",
            "",
            "   ",
            "[a] [b] live live",
            "must re ad: Google I/O",
            "ＬＩＶＥ：ＮＶＩＤＩＡ　ＧＴＣ",
        ];
        for input in inputs {
            let once = n.normalize_compare(input);
            assert_eq!(n.normalize_compare(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_all_noise_title_becomes_empty() {
        let n = normalizer();
        assert_eq!(n.normalize_compare("[Breaking] LIVE https://x.y/z"), "");
    }

    #[test]
    fn test_empty_noise_list() {
        let n = Normalizer::new(&NormalizerSettings {
            noise_words: vec![],
            junk_phrases: vec![],
        });
        assert_eq!(n.normalize_compare("Breaking News"), "breakingnews");
        assert_eq!(n.clean_display("Breaking  News"), "Breaking News");
    }
}
