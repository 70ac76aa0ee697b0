use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_DB_PATH: &str = "dupeindex.db";
pub const DEFAULT_HASH_CACHE_PATH: &str = "content_hash_cache.db";

/// Probe threads used by refresh. Probing is metadata-syscall bound, so this
/// is tuned for I/O overlap rather than core count.
pub const DEFAULT_PROBE_WORKERS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub root_paths: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_hash_cache_path")]
    pub hash_cache_path: String,
    #[serde(default = "default_probe_workers")]
    pub probe_workers: usize,
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_hash_cache_path() -> String {
    DEFAULT_HASH_CACHE_PATH.to_string()
}

fn default_probe_workers() -> usize {
    DEFAULT_PROBE_WORKERS
}

impl AppConfig {
    pub fn new(root_paths: Vec<String>) -> Self {
        Self {
            root_paths,
            ignore_patterns: Vec::new(),
            db_path: default_db_path(),
            hash_cache_path: default_hash_cache_path(),
            probe_workers: default_probe_workers(),
        }
    }
}

/// Load `Config.{toml,yaml,json}` from the working directory (optional) and
/// overlay `DUPEINDEX_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("DUPEINDEX")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);

        if result.iter().any(|kept| dir_path.starts_with(kept)) {
            continue;
        }

        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
