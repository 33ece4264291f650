//! Projection of shadow records into the order shape the desk displays.

use crate::classifier::normalize_title;
use crate::document::{decode, Document};
use crate::record::{ShadowRecord, SourceTimestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_DISPLAY_ID_WIDTH: usize = 6;

pub const FALLBACK_CATEGORY: &str = "その他";

/// Title keyword → category, first match wins.
pub const DEFAULT_CATEGORY_RULES: &[(&str, &str)] = &[
    ("スカーフ", "スカーフ"),
    ("ストール", "ストール"),
    ("ネクタイ", "ネクタイ"),
    ("ハンカチ", "ハンカチ"),
    ("風呂敷", "風呂敷"),
    ("ポケットチーフ", "ポケットチーフ"),
];

/// Content fields consulted when no title keyword matches.
const CONTENT_CATEGORY_FIELDS: &[&str] = &["category", "カテゴリ", "カテゴリー"];

const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Ordered keyword rules used to derive an order's category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    rules: Vec<(String, String)>,
    fallback: String,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::new(Self::default_rules(), FALLBACK_CATEGORY)
    }
}

impl CategoryRules {
    /// The built-in rules as owned pairs.
    pub fn default_rules() -> impl Iterator<Item = (String, String)> {
        DEFAULT_CATEGORY_RULES
            .iter()
            .map(|(k, c)| (k.to_string(), c.to_string()))
    }

    pub fn new<I>(rules: I, fallback: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let rules = rules
            .into_iter()
            .map(|(keyword, category)| (normalize_title(&keyword), category))
            .filter(|(keyword, _)| !keyword.is_empty())
            .collect();
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Title keywords first, then a category supplied in the content, then
    /// the catch-all.
    pub fn categorize(&self, title: &str, doc: &Document) -> String {
        let normalized = normalize_title(title);
        if let Some((_, category)) = self
            .rules
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword.as_str()))
        {
            return category.clone();
        }

        CONTENT_CATEGORY_FIELDS
            .iter()
            .filter_map(|field| doc.text_value(field))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// A display instant plus whether it was made up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDate {
    pub at: DateTime<Utc>,
    /// Set when `created` was missing or unparseable and `at` is the
    /// projection time rather than the order time.
    pub is_fallback: bool,
}

impl DisplayDate {
    pub fn formatted(&self) -> String {
        self.at.format(DISPLAY_DATE_FORMAT).to_string()
    }
}

/// Derive the display date of an order, falling back to `now`.
pub fn derive_display_date(created: &SourceTimestamp, now: DateTime<Utc>) -> DisplayDate {
    match created.to_utc() {
        Some(at) => DisplayDate {
            at,
            is_fallback: false,
        },
        None => DisplayDate {
            at: now,
            is_fallback: true,
        },
    }
}

/// Zero-padded order number, e.g. `000042`.
pub fn display_id(id: i64, width: usize) -> String {
    if id < 0 {
        format!("-{:0width$}", id.unsigned_abs(), width = width)
    } else {
        format!("{:0width$}", id, width = width)
    }
}

/// Settings for projecting records into [`OrderView`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub category_rules: CategoryRules,
    pub display_id_width: usize,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            category_rules: CategoryRules::default(),
            display_id_width: DEFAULT_DISPLAY_ID_WIDTH,
        }
    }
}

/// One order as listed by the desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub original_id: i64,
    pub display_id: String,
    pub title: String,
    pub customer: String,
    pub status: String,
    pub category: String,
    pub order_date: String,
    pub ordered_at: DateTime<Utc>,
    pub date_is_fallback: bool,
    /// Flattened content: extras first, then attrs on top.
    pub fields: BTreeMap<String, String>,
    pub is_edited: bool,
    pub edited_at: Option<i64>,
    pub edited_by: Option<String>,
}

impl OrderView {
    pub fn project(record: &ShadowRecord, projection: &Projection, now: DateTime<Utc>) -> Self {
        let doc = decode(&record.content);
        let date = derive_display_date(&record.created, now);
        let category = projection.category_rules.categorize(&record.title, &doc);

        Self {
            id: record.id,
            original_id: record.original_id,
            display_id: display_id(record.id, projection.display_id_width),
            title: record.title.clone(),
            customer: record.customer.clone(),
            status: record.status.clone(),
            category,
            order_date: date.formatted(),
            ordered_at: date.at,
            date_is_fallback: date.is_fallback,
            fields: flatten_fields(&doc),
            is_edited: record.is_edited,
            edited_at: record.edited_at,
            edited_by: record.edited_by.clone(),
        }
    }
}

fn flatten_fields(doc: &Document) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = doc
        .extras
        .iter()
        .filter(|(_, value)| !value.is_object() && !value.is_array())
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect();
    // Later duplicates of the same attr name do not override the first.
    for attr in doc.attrs.iter().rev() {
        fields.insert(attr.name.clone(), attr.value_text());
    }
    fields
}
