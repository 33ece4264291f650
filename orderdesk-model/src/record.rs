//! Source and shadow order records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Epoch values above this magnitude are taken to be milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Naive layouts accepted for textual `created` values, tried in order.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Creation time of an intake record as delivered upstream.
///
/// The intake form has emitted both unix epochs and formatted strings over
/// time, so the raw value is kept as-is and only interpreted on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum SourceTimestamp {
    Epoch(i64),
    Text(String),
    #[default]
    Missing,
}

impl SourceTimestamp {
    /// Rebuild from the two nullable storage columns.
    pub fn from_columns(epoch: Option<i64>, text: Option<String>) -> Self {
        match (epoch, text) {
            (Some(e), _) => Self::Epoch(e),
            (None, Some(t)) => Self::Text(t),
            (None, None) => Self::Missing,
        }
    }

    pub fn epoch_column(&self) -> Option<i64> {
        match self {
            Self::Epoch(e) => Some(*e),
            _ => None,
        }
    }

    pub fn text_column(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Interpret the raw value as a UTC instant.
    ///
    /// Returns `None` for missing or unparseable input. Naive date-times are
    /// read as UTC.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(e) => epoch_to_utc(*e),
            Self::Text(t) => parse_text_timestamp(t),
            Self::Missing => None,
        }
    }
}

fn epoch_to_utc(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() > EPOCH_MILLIS_THRESHOLD.unsigned_abs() {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn parse_text_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let digits = text.strip_prefix('-').unwrap_or(text);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return text.parse::<i64>().ok().and_then(epoch_to_utc);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// An order as captured by the intake form. Never written by this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub created: SourceTimestamp,
    /// Raw JSON document blob. May be malformed.
    #[serde(default)]
    pub content: String,
}

impl SourceRecord {
    pub fn new(
        id: i64,
        title: impl Into<String>,
        customer: impl Into<String>,
        created: SourceTimestamp,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            customer: customer.into(),
            created,
            content: content.into(),
        }
    }
}

/// The editable mirror of one [`SourceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRecord {
    pub id: i64,
    pub original_id: i64,
    pub title: String,
    pub customer: String,
    pub created: SourceTimestamp,
    pub content: String,
    pub status: String,
    pub is_edited: bool,
    pub is_display_target: bool,
    pub last_sync_at: Option<i64>,
    pub edited_at: Option<i64>,
    pub edited_by: Option<String>,
    pub revision: i64,
}

impl ShadowRecord {
    /// A fresh, unedited mirror of `source`.
    pub fn from_source(
        source: &SourceRecord,
        is_display_target: bool,
        status: impl Into<String>,
        synced_at: i64,
    ) -> Self {
        Self {
            id: source.id,
            original_id: source.id,
            title: source.title.clone(),
            customer: source.customer.clone(),
            created: source.created.clone(),
            content: source.content.clone(),
            status: status.into(),
            is_edited: false,
            is_display_target,
            last_sync_at: Some(synced_at),
            edited_at: None,
            edited_by: None,
            revision: 0,
        }
    }

    /// True when every mirrored field still equals the source.
    pub fn mirrors(&self, source: &SourceRecord) -> bool {
        self.title == source.title
            && self.customer == source.customer
            && self.created == source.created
            && self.content == source.content
    }
}
