//! Streaming batch API: emit items as they complete.
//!
//! Unlike the eager [`crate::analyze::analyze_many`] which returns only
//! after every item finishes, [`analyze_stream`] yields each
//! [`ItemResult`] as soon as its extraction completes. Items are processed
//! strictly in input order, one at a time, so the stream also arrives in
//! input order; the win is latency to the first result, not throughput.
//!
//! The quota short-circuit behaves exactly as in the eager batch: once an
//! item reports quota exhaustion, the remaining items are yielded as
//! skipped without any remote call. The status is owned by the stream's
//! internal state and dies with it.

use crate::config::AnalysisConfig;
use crate::error::{ItemError, Shot2DataError};
use crate::output::ItemResult;
use crate::pipeline::{encode, llm};
use crate::provider::{resolve_provider, VisionProvider};
use futures::stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-item results.
pub type ItemStream = Pin<Box<dyn Stream<Item = ItemResult> + Send>>;

/// State threaded through the stream: the remaining queue plus the
/// quota-halt status.
struct StreamState {
    queue: std::vec::IntoIter<PathBuf>,
    provider: Arc<dyn VisionProvider>,
    config: AnalysisConfig,
    quota_halt: Option<String>,
}

/// Analyze images one at a time, yielding each result as it is ready.
///
/// # Errors
/// Fatal only when no provider can be resolved; per-item failures are
/// yielded inside the stream.
pub fn analyze_stream(
    paths: Vec<PathBuf>,
    config: &AnalysisConfig,
) -> Result<ItemStream, Shot2DataError> {
    let provider = resolve_provider(config)?;
    info!("Starting streaming batch of {} images", paths.len());

    let state = StreamState {
        queue: paths.into_iter(),
        provider,
        config: config.clone(),
        quota_halt: None,
    };

    let s = stream::unfold(state, |mut state| async move {
        let path = state.queue.next()?;

        let item = if let Some(ref reason) = state.quota_halt {
            ItemResult::skipped(&path, reason)
        } else {
            match encode::encode_path(&path) {
                Ok(image) => {
                    llm::extract_item(&state.provider, &path, &image, &state.config).await
                }
                Err(e) => ItemResult::unreadable(&path, e.to_string()),
            }
        };

        if let Some(ItemError::QuotaExhausted { ref detail }) = item.error {
            state.quota_halt = Some(detail.clone());
        }

        Some((item, state))
    });

    Ok(Box::pin(s))
}
