//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the batch controller works through its items.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so one callback can be shared
//! across calls.

use std::path::Path;
use std::sync::Arc;

/// Called by the batch controller as it processes each item.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Batches run sequentially, so events for one batch
/// arrive in order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any item is processed.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called just before an item's provider call is issued.
    ///
    /// Not called for items skipped after quota exhaustion.
    fn on_item_start(&self, index: usize, total_items: usize, path: &Path) {
        let _ = (index, total_items, path);
    }

    /// Called when an item produced an extraction.
    ///
    /// `structured` is true when the response parsed as JSON.
    fn on_item_complete(&self, index: usize, total_items: usize, path: &Path, structured: bool) {
        let _ = (index, total_items, path, structured);
    }

    /// Called when an item failed or was skipped.
    fn on_item_error(&self, index: usize, total_items: usize, path: &Path, error: &str) {
        let _ = (index, total_items, path, error);
    }

    /// Called once after all items have been attempted.
    fn on_batch_complete(&self, total_items: usize, extracted_count: usize) {
        let _ = (total_items, extracted_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_item_start(&self, _index: usize, _total: usize, _path: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _index: usize, _total: usize, _path: &Path, _structured: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _index: usize, _total: usize, _path: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_item_start(1, 3, Path::new("a.png"));
        cb.on_item_complete(1, 3, Path::new("a.png"), true);
        cb.on_item_error(2, 3, Path::new("b.png"), "failed");
        cb.on_batch_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };

        tracker.on_item_start(1, 2, Path::new("a.png"));
        tracker.on_item_complete(1, 2, Path::new("a.png"), true);
        tracker.on_item_start(2, 2, Path::new("b.png"));
        tracker.on_item_error(2, 2, Path::new("b.png"), "HTTP 503");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_item_start(1, 10, Path::new("x.jpg"));
    }
}
