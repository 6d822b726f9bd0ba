//! Output types: extraction outcomes, batch results, and statistics.
//!
//! Everything here derives `Serialize` so callers can persist results as
//! JSON or forward them over an API boundary without re-mapping. The types
//! are plain data; no methods issue I/O or remote calls.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The outcome of a successful extraction call.
///
/// The remote model is asked for a JSON object, but extraction success does
/// not require successful parsing: a response that is not valid JSON is
/// passed through as [`Extraction::Raw`] rather than failing the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extraction {
    /// The response parsed as a JSON object or array.
    Structured(serde_json::Value),
    /// The response text, unmodified, when it did not parse as JSON.
    Raw(String),
}

impl Extraction {
    /// The parsed JSON value, if the response was structured.
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Extraction::Structured(v) => Some(v),
            Extraction::Raw(_) => None,
        }
    }

    /// The raw text, if the response did not parse.
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Extraction::Structured(_) => None,
            Extraction::Raw(s) => Some(s),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Extraction::Structured(_))
    }
}

/// Result of one item in a batch.
///
/// Exactly one of `extraction` / `error` is `Some`. Items are returned in
/// input order regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    /// The image path this result belongs to.
    pub path: PathBuf,
    /// The extraction outcome, when the call succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<Extraction>,
    /// The failure, when the call did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
    /// Retries consumed before the final outcome.
    pub retries: u8,
    /// Wall-clock duration of this item, including backoff delays.
    pub duration_ms: u64,
}

impl ItemResult {
    /// An item recorded as skipped without any remote call.
    pub(crate) fn skipped(path: &Path, reason: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            extraction: None,
            error: Some(ItemError::Skipped {
                reason: reason.to_string(),
            }),
            retries: 0,
            duration_ms: 0,
        }
    }

    /// An item whose image file could not be read or recognised.
    pub(crate) fn unreadable(path: &Path, detail: String) -> Self {
        Self {
            path: path.to_path_buf(),
            extraction: None,
            error: Some(ItemError::Unreadable { detail }),
            retries: 0,
            duration_ms: 0,
        }
    }
}

/// Aggregate counters for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Items submitted to the batch.
    pub total_items: usize,
    /// Items that produced an extraction.
    pub extracted_items: usize,
    /// Items that failed (excluding skips).
    pub failed_items: usize,
    /// Items skipped after quota exhaustion.
    pub skipped_items: usize,
    /// Wall-clock duration of the whole batch.
    pub total_duration_ms: u64,
}

/// Complete result of a batch run: ordered per-item results plus stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub items: Vec<ItemResult>,
    pub stats: BatchStats,
}

/// Description of a written composite image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeInfo {
    /// Where the composite was written (under the source's `merged/` dir).
    pub path: PathBuf,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// How many source images were tiled.
    pub image_count: usize,
}

/// Result of the end-to-end merge-then-analyze operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedAnalysis {
    /// Caller-supplied identifier; names the composite and keys the payload.
    pub identifier: String,
    pub composite: CompositeInfo,
    pub extraction: Extraction,
}
