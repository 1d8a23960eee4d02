/*!
 * Durable storage for the translation cache.
 *
 * - `connection`: SQLite handle shared across blocking tasks and processes
 * - `schema`: table definitions and schema versioning
 * - `cache_store`: `CacheStore` implementation over SQLite
 */

pub mod cache_store;
pub mod connection;
pub mod schema;

// Re-export main types
pub use cache_store::{CacheTableStats, SqliteCacheStore};
pub use connection::{CacheLocation, DatabaseConnection};
