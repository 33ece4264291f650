//! Shadow store configuration.

use crate::error::{ShadowError, ShadowResult};
use orderdesk_model::{
    CategoryRules, DisplayClassifier, Projection, DEFAULT_DISPLAY_ID_WIDTH, FALLBACK_CATEGORY,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the shadow store and the operations run against it.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// DuckDB `memory_limit` pragma.
    pub memory_limit: String,

    /// DuckDB worker threads.
    pub threads: u32,

    /// How long an operation waits for the store before giving up with
    /// `Unavailable`.
    pub lock_timeout_ms: u64,

    /// Upper bound for `page_size` in listings.
    pub max_page_size: i64,

    /// Digits in the zero-padded display id.
    pub display_id_width: usize,

    /// Status given to newly mirrored records and restored on revert.
    pub default_status: String,

    /// Replaces the built-in exclusion keywords when set.
    pub exclusion_patterns: Option<Vec<String>>,

    /// Replaces the built-in `(keyword, category)` rules when set.
    pub category_rules: Option<Vec<(String, String)>>,

    /// Category used when neither title nor content name one.
    pub fallback_category: String,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            memory_limit: "256MB".to_string(),
            threads: 2,
            lock_timeout_ms: 5_000,
            max_page_size: 200,
            display_id_width: DEFAULT_DISPLAY_ID_WIDTH,
            default_status: "new".to_string(),
            exclusion_patterns: None,
            category_rules: None,
            fallback_category: FALLBACK_CATEGORY.to_string(),
        }
    }
}

impl ShadowConfig {
    /// Load a (possibly partial) JSON config file.
    pub fn from_json_file(path: &Path) -> ShadowResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ShadowResult<()> {
        if self.threads == 0 {
            return Err(ShadowError::Config("threads must be at least 1".into()));
        }
        if self.max_page_size < 1 {
            return Err(ShadowError::Config(
                "max_page_size must be at least 1".into(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(ShadowError::Config(
                "lock_timeout_ms must be at least 1".into(),
            ));
        }
        if self.memory_limit.trim().is_empty() {
            return Err(ShadowError::Config("memory_limit is empty".into()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn classifier(&self) -> DisplayClassifier {
        match &self.exclusion_patterns {
            Some(patterns) => DisplayClassifier::with_patterns(patterns),
            None => DisplayClassifier::default(),
        }
    }

    pub fn projection(&self) -> Projection {
        let category_rules = match &self.category_rules {
            Some(rules) => CategoryRules::new(rules.iter().cloned(), self.fallback_category.clone()),
            None => CategoryRules::new(
                CategoryRules::default_rules(),
                self.fallback_category.clone(),
            ),
        };
        Projection {
            category_rules,
            display_id_width: self.display_id_width,
        }
    }
}

#[cfg(test)]
impl ShadowConfig {
    /// A config with a short lock timeout for contention tests.
    pub fn test() -> Self {
        Self {
            lock_timeout_ms: 50,
            threads: 1,
            ..Self::default()
        }
    }
}
