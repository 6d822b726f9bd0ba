//! Extraction client: drive the provider call with retry and backoff.
//!
//! ## Retry Strategy
//!
//! HTTP 429/500/503 from vision APIs are transient and frequent. Exponential
//! backoff (`retry_backoff_ms * 2^attempt`, capped at `retry_backoff_cap_ms`)
//! avoids hammering a recovering endpoint while bounding the worst-case
//! stall: with a 1 s base and 3 retries the wait sequence is 1 s, 2 s, 4 s.
//! Each attempt additionally runs under its own deadline
//! (`api_timeout_secs`) so a hung connection is converted into a transient
//! failure instead of stalling the batch indefinitely.
//!
//! Quota exhaustion is different in kind: the allowance will not recover on
//! a retry timescale, so it is surfaced immediately, without any delay,
//! as the structurally distinct [`ItemError::QuotaExhausted`].

use crate::config::AnalysisConfig;
use crate::error::ItemError;
use crate::output::ItemResult;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::normalize;
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use crate::provider::{ExtractionRequest, ProviderError, VisionProvider};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Run one image through the provider, retrying transient failures.
///
/// Always returns an `ItemResult`; the error, if any, is recorded inside so
/// a single bad item cannot abort a batch. Callers that need a hard error
/// (the single-image API) convert the recorded [`ItemError`] themselves.
pub async fn extract_item(
    provider: &Arc<dyn VisionProvider>,
    path: &Path,
    image: &EncodedImage,
    config: &AnalysisConfig,
) -> ItemResult {
    let start = Instant::now();
    let prompt = config
        .prompt
        .as_deref()
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    let request = ExtractionRequest {
        prompt,
        image_base64: &image.base64,
        mime_type: image.mime_type,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };
    let deadline = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<ProviderError> = None;
    let mut retries_used = 0u8;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(
                config.retry_backoff_ms,
                config.retry_backoff_cap_ms,
                attempt,
            );
            warn!(
                "{}: retry {}/{} after {}ms",
                path.display(),
                attempt,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }
        retries_used = attempt.min(u8::MAX as u32) as u8;

        let outcome = match timeout(deadline, provider.extract(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                elapsed_ms: deadline.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(content) => {
                let duration = start.elapsed();
                debug!(
                    "{}: extracted {} bytes in {:?} ({} retries)",
                    path.display(),
                    content.len(),
                    duration,
                    attempt
                );
                return ItemResult {
                    path: path.to_path_buf(),
                    extraction: Some(normalize::normalize(&content)),
                    error: None,
                    retries: retries_used,
                    duration_ms: duration.as_millis() as u64,
                };
            }
            Err(e) if e.is_quota() => {
                warn!("{}: quota exhausted, not retrying", path.display());
                return ItemResult {
                    path: path.to_path_buf(),
                    extraction: None,
                    error: Some(ItemError::QuotaExhausted {
                        detail: e.to_string(),
                    }),
                    retries: retries_used,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "{}: attempt {} failed: {}",
                    path.display(),
                    attempt + 1,
                    e
                );
                last_err = Some(e);
            }
            Err(e) => {
                // permanent: retrying a 400 or a bad key changes nothing
                warn!("{}: permanent failure: {}", path.display(), e);
                last_err = Some(e);
                break;
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    let error = match last_err {
        Some(ProviderError::Timeout { .. }) => ItemError::Timeout {
            secs: config.api_timeout_secs,
        },
        Some(e) => ItemError::ExtractionFailed {
            retries: retries_used,
            detail: e.to_string(),
        },
        None => ItemError::ExtractionFailed {
            retries: retries_used,
            detail: "Unknown error".to_string(),
        },
    };

    ItemResult {
        path: path.to_path_buf(),
        extraction: None,
        error: Some(error),
        retries: retries_used,
        duration_ms,
    }
}

/// Delay before retry `attempt` (1-based), in milliseconds.
fn backoff_delay(initial_ms: u64, cap_ms: u64, attempt: u32) -> u64 {
    let shift = (attempt - 1).min(20);
    initial_ms.saturating_mul(1u64 << shift).min(cap_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1000, 30_000, 1), 1000);
        assert_eq!(backoff_delay(1000, 30_000, 2), 2000);
        assert_eq!(backoff_delay(1000, 30_000, 3), 4000);
    }

    #[test]
    fn backoff_respects_cap() {
        assert_eq!(backoff_delay(1000, 3000, 3), 3000);
        assert_eq!(backoff_delay(1000, 3000, 10), 3000);
    }

    #[test]
    fn backoff_does_not_overflow_on_large_attempts() {
        assert_eq!(backoff_delay(u64::MAX / 2, u64::MAX, 40), u64::MAX);
    }
}
