//! Incremental consistency pass over an existing index.
//!
//! Refresh drops every tracked path that is no longer an accessible regular
//! file and prunes the duplicate sets that fall below two members. It never
//! hashes and never adds paths; finding new duplicates is the scanner's job.
//!
//! The pass has two strict phases. All probing happens while the set cursor
//! is open and only reads the store. Removals and pruning start after the
//! cursor is closed and every probe has finished.

use crate::config::DEFAULT_PROBE_WORKERS;
use crate::error::Error;
use crate::fanout::{Emitter, FanOut};
use crate::probe::{ProbeConfig, Prober};
use crate::progress::ProgressReporter;
use crate::storage::Database;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-call options. Reserved; no flags yet.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct RefreshOptions {}

#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    pub workers: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_PROBE_WORKERS,
        }
    }
}

#[derive(Debug)]
pub struct RefreshResult {
    pub removed: usize,
    pub pruned_sets: usize,
    pub probed: usize,
    pub duration: Duration,
}

pub struct Refresher<'r> {
    fan_out: FanOut,
    reporter: &'r dyn ProgressReporter,
}

impl<'r> Refresher<'r> {
    pub fn new(config: RefreshConfig, reporter: &'r dyn ProgressReporter) -> Result<Self, Error> {
        Ok(Self {
            fan_out: FanOut::new(config.workers)?,
            reporter,
        })
    }

    pub fn refresh(
        &self,
        db: &mut Database,
        _options: &RefreshOptions,
    ) -> Result<RefreshResult, Error> {
        let start = Instant::now();

        let summary = db.summary()?;
        self.reporter.on_refresh_start(summary.files);
        debug!(
            "Refreshing {} tracked files in {} duplicate sets with {} workers",
            summary.files,
            summary.duplicate_sets,
            self.fan_out.workers()
        );

        let prober = Prober::new(ProbeConfig::presence_only());
        let probed = AtomicUsize::new(0);
        let reporter = self.reporter;

        // Phase 1: probe. The cursor holds a shared borrow of `db`, so nothing
        // below can mutate the store until the gone list is fully drained.
        let mut gone: Vec<String> = db.stream_duplicate_sets(|sets| {
            let paths = sets.flat_map(|set| set.paths);
            self.fan_out
                .run(paths, |path: String, gone: &Emitter<String>| {
                    let outcome = prober.probe(&path);
                    probed.fetch_add(1, Ordering::Relaxed);
                    reporter.on_refresh_progress();
                    if outcome.is_gone() {
                        info!("removing '{}' from database", path);
                        gone.emit(path);
                    }
                })
                .collect::<Vec<String>>()
        })?;

        // Phase 2: mutate, in path order. No rollback on failure; earlier
        // removals stand.
        gone.sort_unstable();
        for path in &gone {
            db.remove(path)?;
        }
        let pruned_sets = db.prune_singletons()?;

        let duration = start.elapsed();
        self.reporter.on_refresh_complete(gone.len(), duration.as_secs_f64());
        debug!(
            "Refresh completed in {:.2}s: {} removed, {} sets pruned",
            duration.as_secs_f64(),
            gone.len(),
            pruned_sets
        );

        Ok(RefreshResult {
            removed: gone.len(),
            pruned_sets,
            probed: probed.into_inner(),
            duration,
        })
    }
}
