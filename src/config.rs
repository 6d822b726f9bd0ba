//! Configuration types for screenshot analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across calls and to diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Shot2DataError;
use crate::pipeline::tile::TileOptions;
use crate::progress::ProgressCallback;
use crate::provider::VisionProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for extraction and tiling.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use shot2data::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gpt-4o-mini")
///     .max_retries(3)
///     .retry_backoff_ms(1000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Model identifier, e.g. "gpt-4o-mini". If None, uses
    /// `SHOT2DATA_MODEL` or the built-in default.
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint. If None, uses
    /// `SHOT2DATA_BASE_URL` or api.openai.com.
    pub base_url: Option<String>,

    /// API key. If None, read from `SHOT2DATA_API_KEY` / `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    /// Pre-constructed provider. Takes precedence over the fields above.
    pub provider: Option<Arc<dyn VisionProvider>>,

    /// Custom extraction prompt. If None, uses the built-in default.
    pub prompt: Option<String>,

    /// Maximum tokens the model may generate per image. Default: 1024.
    ///
    /// The fixed extraction schema fits comfortably under 300 output tokens;
    /// 1024 leaves room for verbose models without letting a confused one
    /// run up the bill.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Extraction is transcription, not generation. Zero temperature keeps
    /// the model faithful to what is on screen.
    pub temperature: f32,

    /// Maximum retry attempts on a transient provider failure. Default: 3.
    ///
    /// Transient means HTTP 429, 500, or 503, or an elapsed per-attempt
    /// deadline. Permanent errors (bad API key, 400) are not retried and
    /// surface immediately; quota exhaustion never consumes a retry.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff).
    /// Default: 1000.
    ///
    /// Doubles after each attempt: 1 s, 2 s, 4 s, bounded by
    /// [`retry_backoff_cap_ms`](Self::retry_backoff_cap_ms).
    pub retry_backoff_ms: u64,

    /// Ceiling on a single backoff delay in milliseconds. Default: 30 000.
    ///
    /// Uncapped exponential delays reach multi-minute stalls within a few
    /// retries under sustained 503s. The cap bounds the worst case at
    /// `max_retries × retry_backoff_cap_ms`.
    pub retry_backoff_cap_ms: u64,

    /// Per-attempt deadline in seconds. Default: 60.
    ///
    /// Applies to each provider call independently of the backoff schedule,
    /// so a hung connection cannot stall a batch indefinitely. An elapsed
    /// deadline counts as a transient failure.
    pub api_timeout_secs: u64,

    /// Tiling options used by the merge operations.
    pub tile: TileOptions,

    /// Optional per-item progress callback for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            api_key: None,
            provider: None,
            prompt: None,
            max_tokens: 1024,
            temperature: 0.0,
            max_retries: 3,
            retry_backoff_ms: 1000,
            retry_backoff_cap_ms: 30_000,
            api_timeout_secs: 60,
            tile: TileOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn VisionProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("retry_backoff_cap_ms", &self.retry_backoff_cap_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("tile", &self.tile)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms.max(1);
        self
    }

    pub fn retry_backoff_cap_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_cap_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn tile(mut self, options: TileOptions) -> Self {
        self.config.tile = options;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, Shot2DataError> {
        let c = &self.config;
        if c.retry_backoff_cap_ms < c.retry_backoff_ms {
            return Err(Shot2DataError::InvalidConfig(format!(
                "Backoff cap ({} ms) must be >= initial backoff ({} ms)",
                c.retry_backoff_cap_ms, c.retry_backoff_ms
            )));
        }
        if c.tile.quality == 0 || c.tile.quality > 100 {
            return Err(Shot2DataError::InvalidConfig(format!(
                "Composite quality must be 1-100, got {}",
                c.tile.quality
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tile::{Direction, OutputFormat};

    #[test]
    fn defaults_match_documented_values() {
        let c = AnalysisConfig::default();
        assert_eq!(c.max_tokens, 1024);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 1000);
        assert_eq!(c.retry_backoff_cap_ms, 30_000);
        assert_eq!(c.api_timeout_secs, 60);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = AnalysisConfig::builder()
            .temperature(5.0)
            .build()
            .expect("valid");
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn build_rejects_cap_below_initial_backoff() {
        let result = AnalysisConfig::builder()
            .retry_backoff_ms(5000)
            .retry_backoff_cap_ms(100)
            .build();
        assert!(matches!(result, Err(Shot2DataError::InvalidConfig(_))));
    }

    #[test]
    fn build_rejects_out_of_range_quality() {
        let tile = TileOptions {
            quality: 0,
            ..TileOptions::default()
        };
        let result = AnalysisConfig::builder().tile(tile).build();
        assert!(matches!(result, Err(Shot2DataError::InvalidConfig(_))));
    }

    #[test]
    fn tile_options_flow_through() {
        let tile = TileOptions {
            direction: Direction::Horizontal,
            margin: 4,
            max_per_row: std::num::NonZeroUsize::new(3),
            format: OutputFormat::Png,
            quality: 90,
        };
        let c = AnalysisConfig::builder().tile(tile).build().expect("valid");
        assert_eq!(c.tile.direction, Direction::Horizontal);
        assert_eq!(c.tile.max_per_row.map(|n| n.get()), Some(3));
    }
}
