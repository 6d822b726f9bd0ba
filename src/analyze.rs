//! Eager analysis entry points.
//!
//! This module provides the simpler API: run every item to completion, then
//! return. Use [`crate::stream::analyze_stream`] instead when callers want
//! items progressively.
//!
//! Batches run strictly sequentially. Extraction is network-bound, but the
//! typical batch here is a handful of screenshots per user, and sequential
//! processing keeps the provider call rate trivially within rate limits.
//! The backoff sleep and the provider call are the only suspension points,
//! so a concurrent host can serve other work while a batch waits.

use crate::config::AnalysisConfig;
use crate::error::{ItemError, Shot2DataError};
use crate::output::{BatchOutput, BatchStats, Extraction, ItemResult, MergedAnalysis};
use crate::pipeline::{encode, llm, tile};
use crate::provider::resolve_provider;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Extract structured data from a single image.
///
/// # Errors
/// Returns the most specific fatal error available: quota exhaustion keeps
/// its distinct variant so callers can stop scheduling further work.
pub async fn analyze(
    image_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<Extraction, Shot2DataError> {
    let path = image_path.as_ref();
    let provider = resolve_provider(config)?;
    let image = encode::encode_path(path)?;

    let item = llm::extract_item(&provider, path, &image, config).await;
    match (item.extraction, item.error) {
        (Some(extraction), None) => Ok(extraction),
        (_, Some(ItemError::QuotaExhausted { detail })) => Err(Shot2DataError::QuotaExhausted {
            provider: provider.name().to_string(),
            detail,
        }),
        (_, Some(error)) => Err(Shot2DataError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: error.to_string(),
        }),
        (None, None) => Err(Shot2DataError::Internal(
            "extraction produced neither result nor error".to_string(),
        )),
    }
}

/// Explicit batch status instead of a shared mutable flag.
///
/// Once quota is exhausted the remaining items are recorded as skipped
/// without issuing any remote call. The status lives only for the duration
/// of one batch; nothing survives the call.
enum BatchControl {
    Continue,
    QuotaHalted(String),
}

/// Analyze a list of images in order, isolating per-item failures.
///
/// One item's terminal failure does not abort the batch: its error is
/// recorded in the result list and the batch continues. The returned list
/// always has exactly one entry per input path, in input order.
///
/// # Errors
/// Fatal only when no provider can be resolved; everything item-level is
/// reported inside [`BatchOutput`].
pub async fn analyze_many(
    paths: &[PathBuf],
    config: &AnalysisConfig,
) -> Result<BatchOutput, Shot2DataError> {
    let provider = resolve_provider(config)?;
    let total = paths.len();
    let start = Instant::now();
    info!("Starting batch of {} images", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut control = BatchControl::Continue;
    let mut items: Vec<ItemResult> = Vec::with_capacity(total);

    for (i, path) in paths.iter().enumerate() {
        let index = i + 1;

        if let BatchControl::QuotaHalted(ref reason) = control {
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_error(index, total, path, reason);
            }
            items.push(ItemResult::skipped(path, reason));
            continue;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_item_start(index, total, path);
        }

        let item = match encode::encode_path(path) {
            Ok(image) => llm::extract_item(&provider, path, &image, config).await,
            Err(e) => ItemResult::unreadable(path, e.to_string()),
        };

        if let Some(ItemError::QuotaExhausted { ref detail }) = item.error {
            warn!("Quota exhausted; skipping the remaining {} items", total - index);
            control = BatchControl::QuotaHalted(detail.clone());
        }

        if let Some(ref cb) = config.progress_callback {
            match (&item.extraction, &item.error) {
                (Some(extraction), None) => {
                    cb.on_item_complete(index, total, path, extraction.is_structured())
                }
                (_, Some(error)) => cb.on_item_error(index, total, path, &error.to_string()),
                _ => {}
            }
        }

        items.push(item);
    }

    let stats = batch_stats(&items, start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} extracted, {} failed, {} skipped",
        stats.extracted_items, stats.total_items, stats.failed_items, stats.skipped_items
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.extracted_items);
    }

    Ok(BatchOutput { items, stats })
}

/// Analyze a batch and write the results JSON to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    paths: &[PathBuf],
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<BatchStats, Shot2DataError> {
    let output = analyze_many(paths, config).await?;
    write_json_atomic(output_path.as_ref(), &output)?;
    Ok(output.stats)
}

/// Merge a directory of screenshots into one composite and analyze it.
///
/// This is the end-to-end operation: scan, decode, tile, write the
/// composite under `merged/`, then run one extraction over it. The
/// identifier names the composite file and keys the result payload.
pub async fn merge_and_analyze(
    dir: impl AsRef<Path>,
    identifier: &str,
    config: &AnalysisConfig,
) -> Result<MergedAnalysis, Shot2DataError> {
    if identifier.trim().is_empty() {
        return Err(Shot2DataError::MissingIdentifier);
    }

    let composite = tile::merge_directory(dir, identifier, &config.tile).await?;
    info!(
        "Composite ready: {} ({}x{}, {} images)",
        composite.path.display(),
        composite.width,
        composite.height,
        composite.image_count
    );

    let extraction = analyze(&composite.path, config).await?;
    Ok(MergedAnalysis {
        identifier: identifier.to_string(),
        composite,
        extraction,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn batch_stats(items: &[ItemResult], total_duration_ms: u64) -> BatchStats {
    let extracted = items.iter().filter(|i| i.error.is_none()).count();
    let skipped = items
        .iter()
        .filter(|i| matches!(i.error, Some(ItemError::Skipped { .. })))
        .count();
    BatchStats {
        total_items: items.len(),
        extracted_items: extracted,
        failed_items: items.len() - extracted - skipped,
        skipped_items: skipped,
        total_duration_ms,
    }
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Shot2DataError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| Shot2DataError::Internal(format!("Serialise results: {e}")))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| Shot2DataError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(&parent).map_err(|e| Shot2DataError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tmp.write_all(&json)
        .map_err(|e| Shot2DataError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tmp.persist(path)
        .map_err(|e| Shot2DataError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}
