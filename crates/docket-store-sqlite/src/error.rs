//! Error type for `docket-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] docket_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row holds a value outside the declared enumerations.
  #[error("corrupt row: {0}")]
  Decode(String),

  /// A transition was applied but the request could not be read back.
  #[error("request vanished after update: {0}")]
  Vanished(docket_core::request::RequestId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
