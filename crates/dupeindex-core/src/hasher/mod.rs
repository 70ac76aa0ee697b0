pub mod cache;
pub mod xxhash;

pub use cache::HashCache;
pub use xxhash::{build_content_hash_map, hash_file};
