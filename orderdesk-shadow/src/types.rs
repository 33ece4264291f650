//! Public data types for sync runs, field updates and listings.

use orderdesk_model::{OrderView, ShadowRecord};
use serde::{Deserialize, Serialize};

// ── Sync ────────────────────────────────────────────────────────────────

/// Which reconciliation mode a run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Only source ids not yet mirrored.
    Incremental,
    /// Every source record; unedited mirrors are refreshed.
    Full,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "incremental" => Some(Self::Incremental),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a sync log entry: `Running` → `Completed` | `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One persisted sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub records_processed: i64,
    pub records_added: i64,
    pub records_updated: i64,
    pub records_skipped: i64,
    pub records_unchanged: i64,
    pub records_failed: i64,
    pub sync_start_at: i64,
    pub sync_end_at: Option<i64>,
    pub error_message: Option<String>,
}

/// Summary returned to the caller of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub sync_id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub records_processed: i64,
    pub records_added: i64,
    pub records_updated: i64,
    /// Edited mirrors left alone, plus inserts that lost a race.
    pub records_skipped: i64,
    pub records_unchanged: i64,
    pub records_failed: i64,
    pub duration_ms: i64,
    pub skipped_ids: Vec<i64>,
    pub failed_ids: Vec<i64>,
}

// ── Field updates ───────────────────────────────────────────────────────

/// Structured shadow columns staff may edit directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Title,
    Customer,
    Status,
}

/// Field names that address a structured column; anything else is an attr.
const STRUCTURED_FIELDS: &[(&str, Column)] = &[
    ("title", Column::Title),
    ("form_title", Column::Title),
    ("form_name", Column::Title),
    ("customer", Column::Customer),
    ("customer_name", Column::Customer),
    ("status", Column::Status),
];

impl Column {
    pub(crate) fn sql_name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Customer => "customer",
            Self::Status => "status",
        }
    }

    pub(crate) fn read<'a>(&self, record: &'a ShadowRecord) -> &'a str {
        match self {
            Self::Title => &record.title,
            Self::Customer => &record.customer,
            Self::Status => &record.status,
        }
    }
}

/// Where a field update lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    StructuredColumn(Column),
    AttributeEntry(String),
}

impl FieldTarget {
    pub fn resolve(field_name: &str) -> Self {
        STRUCTURED_FIELDS
            .iter()
            .find(|(name, _)| *name == field_name)
            .map(|(_, column)| Self::StructuredColumn(*column))
            .unwrap_or_else(|| Self::AttributeEntry(field_name.to_string()))
    }
}

/// Outcome of a single-record write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Updated,
    /// The record already held the value; nothing was written.
    NoOp,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub status: UpdateStatus,
    pub field_name: String,
    pub new_value: String,
    /// Set only when the record was written.
    pub edited_at: Option<i64>,
}

impl UpdateResult {
    pub(crate) fn new(
        status: UpdateStatus,
        field_name: &str,
        new_value: impl Into<String>,
        edited_at: Option<i64>,
    ) -> Self {
        Self {
            status,
            field_name: field_name.to_string(),
            new_value: new_value.into(),
            edited_at,
        }
    }
}

// ── Listing ─────────────────────────────────────────────────────────────

/// One page of listable orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Row counts across the shadow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: i64,
    pub edited: i64,
    pub display_targets: i64,
    pub hidden: i64,
}
