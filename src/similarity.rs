//! Structural similarity between comparable titles.
//!
//! The base score is `2M / T`, where `M` is the length of the longest common
//! subsequence of the two titles (counted in Unicode scalar values, so CJK and
//! Latin headlines are treated alike) and `T` is their combined length. It is
//! symmetric and equals 1.0 for any non-empty title compared with itself.
//!
//! When both titles mention the same watch-list keyword a fixed bonus is
//! added on top. The sum is deliberately not capped; callers only compare it
//! against thresholds.

use crate::settings::SimilaritySettings;
use unicode_normalization::UnicodeNormalization;

/// Scores pairs of comparable titles (see [`crate::normalize::Normalizer::normalize_compare`]).
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    keywords: Vec<String>,
    bonus: f64,
}

impl SimilarityScorer {
    pub fn new(settings: &SimilaritySettings) -> Self {
        let keywords = settings
            .keywords
            .iter()
            .map(|k| {
                k.nfkc()
                    .collect::<String>()
                    .to_lowercase()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
            })
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords,
            bonus: settings.keyword_bonus,
        }
    }

    /// Base score plus the keyword bonus when it applies.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let base = base_score(a, b);
        if self.shares_keyword(a, b) {
            base + self.bonus
        } else {
            base
        }
    }

    /// True when at least one watch-list keyword occurs in both titles.
    pub fn shares_keyword(&self, a: &str, b: &str) -> bool {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        self.keywords
            .iter()
            .any(|k| a.contains(k.as_str()) && b.contains(k.as_str()))
    }
}

/// `2 * LCS(a, b) / (len(a) + len(b))`; 0.0 when either side is empty.
pub fn base_score(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = lcs_length(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// LCS length using two-row DP.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    // keep the shorter sequence in the row
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];

    for x in outer {
        for (j, y) in inner.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[inner.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;

    fn scorer(keywords: &[&str]) -> SimilarityScorer {
        SimilarityScorer::new(&SimilaritySettings {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..SimilaritySettings::default()
        })
    }

    #[test]
    fn test_lcs_length() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(lcs_length(&chars("abcde"), &chars("ace")), 3);
        assert_eq!(lcs_length(&chars("ace"), &chars("abcde")), 3);
        assert_eq!(lcs_length(&chars("abc"), &chars("xyz")), 0);
        assert_eq!(lcs_length(&chars("台積電擴產"), &chars("台積電美國擴產")), 5);
    }

    #[test]
    fn test_base_score_formula() {
        // LCS("abcd", "abed") = 3, T = 8
        assert!((base_score("abcd", "abed") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_self_similarity() {
        for t in ["nvidialaunchesnewgpu", "台積電擴產", "x"] {
            assert_eq!(base_score(t, t), 1.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("appleq3earningsbeatexpectations", "typhoonhitstaiwan"),
            ("companyxraisesfunding", "startupxsecuresnewinvestmentround"),
            ("ソニー決算", "ソフトバンク決算"),
        ];
        for (a, b) in pairs {
            assert_eq!(base_score(a, b), base_score(b, a));
        }
    }

    #[test]
    fn test_empty_titles_score_zero() {
        assert_eq!(base_score("", ""), 0.0);
        assert_eq!(base_score("abc", ""), 0.0);
    }

    #[test]
    fn test_keyword_bonus_requires_both_titles() {
        let s = scorer(&["nvidia"]);
        let a = "nvidialaunchesnewgpu";
        let b = "nvidiaunveilsnext-gengraphicscard";
        let c = "amdunveilsnext-gengraphicscard";
        assert!((s.score(a, b) - (base_score(a, b) + 0.18)).abs() < 1e-9);
        assert_eq!(s.score(a, c), base_score(a, c));
    }

    #[test]
    fn test_keyword_bonus_is_uncapped() {
        let s = scorer(&["apple"]);
        assert!(s.score("appleevent", "appleevent") > 1.0);
    }

    #[test]
    fn test_keywords_match_case_insensitively() {
        let s = scorer(&["TSMC", "台積電"]);
        assert!(s.shares_keyword("tsmcraisescapex", "TSMC to build fab"));
        assert!(s.shares_keyword("台積電擴產", "台積電法說會"));
        assert!(!s.shares_keyword("台積電擴產", "tsmc法說會"));
    }

    #[test]
    fn test_full_width_keywords_are_folded() {
        let s = scorer(&["ＮＶＩＤＩＡ"]);
        assert!(s.shares_keyword("nvidia發表新gpu", "nvidiablackwell出貨"));
    }

    #[test]
    fn test_lexically_close_headlines_clear_high_threshold() {
        let n = Normalizer::default();
        let s = scorer(&["nvidia"]);
        let a = n.normalize_compare("Nvidia launches new GPU");
        let b = n.normalize_compare("NVIDIA unveils next-gen graphics card");
        assert!(s.score(&a, &b) >= 0.65);
    }
}
