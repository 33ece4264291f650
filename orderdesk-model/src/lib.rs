//! Domain model for the order desk.
//!
//! Orders arrive from an external intake form and land in a read-only
//! source ledger. Staff work on shadow copies of those records. This crate
//! holds everything about an order that does not touch storage:
//!
//! - [`SourceRecord`] / [`ShadowRecord`] and their timestamp handling
//! - the attribute codec for the JSON content blob ([`Document`])
//! - the [`DisplayClassifier`] deciding which orders are listed at all
//! - projection of a shadow record into an [`OrderView`]

mod classifier;
mod document;
mod error;
mod order;
mod record;

pub use classifier::{DisplayClassifier, normalize_title, DEFAULT_EXCLUSION_PATTERNS};
pub use document::{decode, encode, try_decode, Attr, AttrChange, Document};
pub use error::{ModelError, ModelResult};
pub use order::{
    derive_display_date, display_id, CategoryRules, DisplayDate, OrderView, Projection,
    DEFAULT_CATEGORY_RULES, DEFAULT_DISPLAY_ID_WIDTH, FALLBACK_CATEGORY,
};
pub use record::{ShadowRecord, SourceRecord, SourceTimestamp};
