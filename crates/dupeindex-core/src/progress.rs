/// Trait for reporting scan and refresh progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations, and every method may be called from a worker thread.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_hash_start(&self, _candidate_files: usize) {}
    fn on_hash_complete(&self, _total_dupes: usize, _duration_secs: f64) {}
    fn on_db_write_start(&self) {}
    fn on_db_write_complete(&self, _rows: usize, _duration_secs: f64) {}

    /// `total_files` is the tracked-file count from the store summary.
    fn on_refresh_start(&self, _total_files: u64) {}
    /// Called once per probed path, whatever the outcome.
    fn on_refresh_progress(&self) {}
    fn on_refresh_complete(&self, _removed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
