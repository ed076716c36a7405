//! Progress reporting for tile downloads.
//!
//! The fetcher reports through [`ProgressCallback`] so it stays agnostic
//! of how progress is rendered; the CLI plugs in an `indicatif` bar.

/// Receives progress updates from long-running tile work.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// across concurrent downloads.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of tiles expected.
    fn set_total(&self, total: u64);

    /// Advances by `delta` tiles.
    fn inc(&self, delta: u64);

    /// Updates the label shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the work as complete with a final message.
    fn finish(&self, msg: String);
}

/// Discards every update. Used by tests and non-interactive runs.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
