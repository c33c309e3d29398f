pub mod connection;
pub mod history;
pub mod kv;

pub use connection::{init_db, Database};
pub use history::SqliteHistoryStore;
