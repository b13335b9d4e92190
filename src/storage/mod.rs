mod cache;
mod schema;
mod types;

pub use schema::Database;
pub use types::{CacheEntry, DatabaseError};
