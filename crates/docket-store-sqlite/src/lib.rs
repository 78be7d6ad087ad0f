//! SQLite backend for the Docket request store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The same store can also serve as the
//! engine's audit sink, persisting notifications alongside the requests.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{Notification, SqliteStore};
