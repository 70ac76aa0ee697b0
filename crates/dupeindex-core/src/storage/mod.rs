pub mod cursor;
pub mod models;
pub mod queries;
pub mod sqlite;

pub use cursor::DuplicateSetCursor;
pub use models::{DuplicateSet, Summary, TrackedFile};
pub use sqlite::Database;
