//! Display classification: which intake forms show up in the order desk.
//!
//! The intake endpoint is shared with non-order forms (sample requests,
//! brochure requests, general inquiries). Those are mirrored like any other
//! record but hidden from the editable listing.

use unicode_normalization::UnicodeNormalization;

/// Exclusion patterns, matched as substrings of the normalized title.
pub const DEFAULT_EXCLUSION_PATTERNS: &[&str] = &[
    "サンプル請求",
    "資料請求",
    "お問い合わせ",
    "問い合わせ",
    "見積依頼",
    "テスト",
    "test",
    "sample request",
    "inquiry",
];

/// Normalize a title for keyword matching.
///
/// NFKC folds full-width ASCII, half-width katakana and decomposed kana to
/// one form, so `ＴＥＳＴ` matches `test` and `ｻﾝﾌﾟﾙ` matches `サンプル`. The
/// result is lowercased and trimmed.
pub fn normalize_title(title: &str) -> String {
    title
        .trim()
        .nfkc()
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Decides whether an order title is eligible for the editable listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayClassifier {
    patterns: Vec<String>,
}

impl Default for DisplayClassifier {
    fn default() -> Self {
        Self::with_patterns(DEFAULT_EXCLUSION_PATTERNS.iter().copied())
    }
}

impl DisplayClassifier {
    /// Build a classifier from a custom exclusion set. Blank patterns are
    /// ignored so they cannot exclude everything.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = patterns
            .into_iter()
            .map(|p| normalize_title(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        Self {
            patterns: normalized,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `false` when the title matches an exclusion pattern. Untitled
    /// records stay visible.
    pub fn is_display_target(&self, title: &str) -> bool {
        let normalized = normalize_title(title);
        if normalized.is_empty() {
            return true;
        }
        !self.patterns.iter().any(|p| normalized.contains(p.as_str()))
    }
}
