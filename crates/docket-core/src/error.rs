//! Error types for `docket-core`.

use thiserror::Error;

use crate::{
  request::{RequestId, RequestKind, RequestStatus},
  role::Role,
  rules::Action,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("request not found: {0}")]
  NotFound(RequestId),

  #[error("request {id} cannot {action} while {status}")]
  InvalidTransition {
    id:     RequestId,
    status: RequestStatus,
    action: Action,
  },

  #[error("role {role} may not {action} a {kind} request while {status}")]
  Unauthorized {
    role:   Role,
    kind:   RequestKind,
    status: RequestStatus,
    action: Action,
  },

  #[error("invalid {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("unrecognised {field}: {value:?}")]
  Unrecognised { field: &'static str, value: String },

  #[error("invalid rule table: {0}")]
  InvalidRules(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Validation { field: field.into(), reason: reason.into() }
  }

  pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }

  /// The message shown to an end user for this error.
  pub fn user_message(&self) -> &'static str {
    match self {
      Self::NotFound(_) => "request not found",
      Self::InvalidTransition { .. } => "this request has already moved past this step",
      Self::Unauthorized { .. } => "you are not permitted to perform this action",
      Self::Validation { .. } => "the request is missing required information",
      Self::Unrecognised { .. } => "the request contains an unrecognised value",
      Self::InvalidRules(_) | Self::Serialization(_) | Self::Store(_) => {
        "something went wrong; please try again later"
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
