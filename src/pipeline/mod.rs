//! Pipeline stages for screenshot analysis.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tile ──▶ encode ──▶ llm ──▶ normalize
//! (dir scan) (compose) (base64)  (VLM)   (fence/JSON)
//! ```
//!
//! 1. [`input`]  — scan the screenshot directory and decode JPEG/PNG files
//! 2. [`tile`]   — lay the images out on one canvas and write the
//!    composite; runs in `spawn_blocking` because decode and encode are
//!    CPU-bound
//! 3. [`encode`] — read image bytes and base64-wrap them for the
//!    multimodal API request body
//! 4. [`llm`]    — drive the provider call with retry/backoff; the only
//!    stage with network I/O
//! 5. [`normalize`] — unwrap code fences and attempt a JSON parse, falling
//!    back to raw text

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod tile;
