pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod hasher;
pub mod probe;
pub mod progress;
pub mod refresh;
pub mod scanner;
pub mod storage;
pub mod tree;

pub use config::AppConfig;
pub use engine::{ScanEngine, ScanResult, ScanStats};
pub use error::Error;
pub use fanout::{Emitter, FanOut};
pub use probe::{ProbeConfig, ProbeOutcome, Prober};
pub use progress::{ProgressReporter, SilentReporter};
pub use refresh::{RefreshConfig, RefreshOptions, RefreshResult, Refresher};
