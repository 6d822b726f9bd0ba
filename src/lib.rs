//! # shot2data
//!
//! Tile activity screenshots into one composite image and extract
//! structured data from it with a Vision Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Fitness apps show a recorded activity across several screens: the map,
//! the splits, the heart-rate graph. Template-based OCR breaks on every
//! app update. Instead this crate tiles the screenshots onto one canvas
//! and lets a VLM read them as a human would, returning the activity
//! fields as JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! screenshots/
//!  │
//!  ├─ 1. Input      scan directory for JPEG/PNG files
//!  ├─ 2. Tile       lay out on one white canvas (stack, row, or grid)
//!  ├─ 3. Encode     composite → base64 data-URI
//!  ├─ 4. Extract    VLM call with retry/backoff and a per-attempt deadline
//!  └─ 5. Normalize  unwrap fences, parse JSON, fall back to raw text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shot2data::{merge_and_analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider picked up from SHOT2DATA_API_KEY / OPENAI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let result = merge_and_analyze("./screenshots/maria", "maria", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&result.extraction)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `shot2data` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! shot2data = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_many, analyze_to_file, merge_and_analyze};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{ItemError, Shot2DataError};
pub use output::{
    BatchOutput, BatchStats, CompositeInfo, Extraction, ItemResult, MergedAnalysis,
};
pub use pipeline::input::{scan_directory, ImageDescriptor};
pub use pipeline::tile::{
    compose, merge_directory, Direction, LayoutPlan, OutputFormat, Placement, TileOptions,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{
    ExtractionRequest, OpenAiCompatibleProvider, ProviderError, VisionProvider,
};
pub use stream::{analyze_stream, ItemStream};
