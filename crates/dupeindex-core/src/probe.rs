//! Per-path existence and type checks.
//!
//! The cheap configuration stats the path without following symlinks and
//! reads no content. Hashing is opt-in through [`ProbeConfig::expected_hash`]
//! and [`ProbeConfig::record_hash`].

use crate::hasher::{self, HashCache};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Anything but an existing, accessible regular file is `Gone`.
    pub require_regular_file: bool,
    /// Recompute the content hash and compare against this value.
    pub expected_hash: Option<u64>,
    /// Store the freshly computed hash in the prober's hash cache.
    pub record_hash: bool,
}

impl ProbeConfig {
    /// Presence and type only. This is what refresh uses.
    pub fn presence_only() -> Self {
        Self {
            require_regular_file: true,
            expected_hash: None,
            record_hash: false,
        }
    }

    pub fn verify_content(expected_hash: u64) -> Self {
        Self {
            expected_hash: Some(expected_hash),
            ..Self::presence_only()
        }
    }

    fn needs_hash(&self) -> bool {
        self.expected_hash.is_some() || self.record_hash
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::presence_only()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Still there. `content_hash` is set only when the config asked for hashing.
    Present {
        size: u64,
        content_hash: Option<u64>,
    },
    /// Missing, not a regular file, or inaccessible. Causes are not told apart.
    Gone,
    ContentChanged {
        actual_hash: u64,
    },
}

impl ProbeOutcome {
    pub fn is_gone(&self) -> bool {
        matches!(self, ProbeOutcome::Gone)
    }
}

pub struct Prober<'c> {
    config: ProbeConfig,
    cache: Option<&'c HashCache>,
}

impl Prober<'static> {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }
}

impl<'c> Prober<'c> {
    /// Prober whose `record_hash` writes go to `cache`.
    pub fn with_cache(config: ProbeConfig, cache: &'c HashCache) -> Self {
        Self {
            config,
            cache: Some(cache),
        }
    }

    pub fn probe(&self, path: &str) -> ProbeOutcome {
        let path = Path::new(path);
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                trace!("Probe of {} failed: {}", path.display(), e);
                return ProbeOutcome::Gone;
            }
        };

        if self.config.require_regular_file && !metadata.file_type().is_file() {
            trace!("{} is no longer a regular file", path.display());
            return ProbeOutcome::Gone;
        }

        if !self.config.needs_hash() {
            return ProbeOutcome::Present {
                size: metadata.len(),
                content_hash: None,
            };
        }

        let hash = match hasher::hash_file(path) {
            Ok(hash) => hash,
            Err(e) => {
                trace!("Hashing {} failed: {}", path.display(), e);
                return ProbeOutcome::Gone;
            }
        };

        if self.config.record_hash {
            if let Some(cache) = self.cache {
                if let Err(e) = cache.record(path, hash) {
                    debug!("Could not record hash for {}: {}", path.display(), e);
                }
            }
        }

        match self.config.expected_hash {
            Some(expected) if expected != hash => {
                ProbeOutcome::ContentChanged { actual_hash: hash }
            }
            _ => ProbeOutcome::Present {
                size: metadata.len(),
                content_hash: Some(hash),
            },
        }
    }
}
