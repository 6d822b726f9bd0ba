//! Error types for the shot2data library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Shot2DataError`] — **Fatal**: the operation cannot proceed at all
//!   (missing directory, empty image set, provider not configured). Returned
//!   as `Err(Shot2DataError)` from the top-level `analyze*` and `merge*`
//!   functions.
//!
//! * [`ItemError`] — **Non-fatal**: a single batch item failed (unreadable
//!   file, extraction failed after retries) but the other items are fine.
//!   Stored inside [`crate::output::ItemResult`] so callers can inspect
//!   partial success rather than losing the whole batch to one bad image.
//!
//! Quota exhaustion appears in both: as a distinct fatal variant for
//! single-item calls, and as a distinct item variant in batches so the
//! controller can stop issuing remote calls for the rest of the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the shot2data library.
///
/// Per-item batch failures use [`ItemError`] and are stored in
/// [`crate::output::ItemResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Shot2DataError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source directory was not found at the given path.
    #[error("Image directory not found: '{path}'\nCheck the path exists and is readable.")]
    DirectoryNotFound { path: PathBuf },

    /// The given path exists but is not a directory.
    #[error("Not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Process does not have read permission on the path.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A single image file was not found at the given path.
    #[error("Image file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The directory exists but contains no JPEG/PNG files.
    #[error("No JPEG or PNG images found in '{path}'")]
    NoImagesFound { path: PathBuf },

    /// An empty image list was passed to a compose operation.
    #[error("Cannot compose an empty image set")]
    EmptyImageSet,

    /// The caller-supplied identifier is empty.
    ///
    /// The identifier names the composite file and keys the result payload,
    /// so a blank one would silently collide between callers.
    #[error("Identifier must not be empty")]
    MissingIdentifier,

    /// The file exists and was read, but is neither JPEG nor PNG.
    #[error("File is not a JPEG or PNG image: '{path}'\nFirst bytes: {magic:?}")]
    UnsupportedFormat { path: PathBuf, magic: [u8; 4] },

    // ── Image errors ──────────────────────────────────────────────────────
    /// An image failed to decode. Aborts the whole merge; no partial
    /// composite is produced.
    #[error("Failed to decode image '{path}': {source}")]
    DecodeFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The composite failed to encode at the requested format/quality.
    #[error("Failed to encode composite image: {source}")]
    EncodeFailed {
        #[source]
        source: image::ImageError,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No vision provider could be resolved (missing API key etc.).
    #[error("Vision provider is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// The remote service reported that the usage allowance is consumed.
    ///
    /// Raised without consuming any retry. Batch callers use this to stop
    /// issuing remote calls for the remainder of the run.
    #[error("Quota exhausted on provider '{provider}': {detail}")]
    QuotaExhausted { provider: String, detail: String },

    /// Extraction failed after all retries; the most specific provider
    /// error is preserved verbatim in `detail`.
    #[error("Extraction failed for '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file (composite or results JSON).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single batch item.
///
/// Stored alongside [`crate::output::ItemResult`] when an item fails.
/// The overall batch continues past failed items; only quota exhaustion
/// short-circuits the remainder (recorded as [`ItemError::Skipped`]).
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// Extraction failed after the retry budget was spent.
    #[error("Extraction failed after {retries} retries: {detail}")]
    ExtractionFailed { retries: u8, detail: String },

    /// The remote service signalled quota/billing exhaustion.
    #[error("Quota exhausted: {detail}")]
    QuotaExhausted { detail: String },

    /// Every attempt hit the per-call deadline.
    #[error("Extraction timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The image file could not be read or recognised.
    #[error("Unreadable image: {detail}")]
    Unreadable { detail: String },

    /// Skipped without a remote call because quota was already exhausted
    /// earlier in the same batch.
    #[error("Skipped: {reason}")]
    Skipped { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_display_names_provider() {
        let e = Shot2DataError::QuotaExhausted {
            provider: "openai".into(),
            detail: "insufficient_quota".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("openai"), "got: {msg}");
        assert!(msg.contains("insufficient_quota"));
    }

    #[test]
    fn unsupported_format_shows_magic() {
        let e = Shot2DataError::UnsupportedFormat {
            path: PathBuf::from("x.gif"),
            magic: [0x47, 0x49, 0x46, 0x38],
        };
        assert!(e.to_string().contains("x.gif"));
    }

    #[test]
    fn item_error_extraction_display() {
        let e = ItemError::ExtractionFailed {
            retries: 3,
            detail: "HTTP 503".into(),
        };
        assert!(e.to_string().contains("3 retries"));
        assert!(e.to_string().contains("HTTP 503"));
    }

    #[test]
    fn item_error_skipped_roundtrips_serde() {
        let e = ItemError::Skipped {
            reason: "quota exhausted".into(),
        };
        let json = serde_json::to_string(&e).expect("serialize");
        let back: ItemError = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(back, ItemError::Skipped { .. }));
    }

    #[test]
    fn quota_item_error_is_distinct_from_generic_failure() {
        let quota = ItemError::QuotaExhausted {
            detail: "billing".into(),
        };
        let generic = ItemError::ExtractionFailed {
            retries: 0,
            detail: "billing".into(),
        };
        assert!(matches!(quota, ItemError::QuotaExhausted { .. }));
        assert!(!matches!(generic, ItemError::QuotaExhausted { .. }));
    }
}
