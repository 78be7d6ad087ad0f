//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("invalid request body: {0}")]
  Body(#[from] JsonRejection),

  #[error("invalid query string: {0}")]
  Query(#[from] QueryRejection),

  #[error(transparent)]
  Engine(#[from] docket_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use docket_core::Error as E;
    match self {
      Self::BadRequest(_) | Self::Query(_) => StatusCode::BAD_REQUEST,
      Self::Body(rejection) => rejection.status(),
      Self::Engine(e) => match e {
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::InvalidTransition { .. } => StatusCode::CONFLICT,
        E::Unauthorized { .. } => StatusCode::FORBIDDEN,
        E::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        E::Unrecognised { .. } => StatusCode::BAD_REQUEST,
        E::InvalidRules(_) | E::Serialization(_) | E::Store(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }

  /// The short message shown to the person who made the request.
  pub fn user_message(&self) -> &'static str {
    match self {
      Self::BadRequest(_) => "bad request",
      Self::Body(_) if self.status() == StatusCode::UNPROCESSABLE_ENTITY => {
        "the request is missing required information"
      }
      Self::Body(_) => "bad request",
      Self::Query(_) => "the request contains an unrecognised value",
      Self::Engine(e) => e.user_message(),
    }
  }

  fn detail(&self) -> String {
    match self {
      Self::Body(rejection) => rejection.body_text(),
      Self::Query(rejection) => rejection.body_text(),
      _ => self.to_string(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "error": self.user_message(), "detail": self.detail() });
    (status, Json(body)).into_response()
  }
}
