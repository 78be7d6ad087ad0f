//! Extractor for the acting user.
//!
//! The identity provider sets `x-actor-role` and `x-actor-name`. Both are
//! required; an unknown role is rejected before any handler runs.

use axum::{extract::FromRequestParts, http::request::Parts};
use docket_core::role::{Actor, Role};

use crate::error::ApiError;

pub const ROLE_HEADER: &str = "x-actor-role";
pub const NAME_HEADER: &str = "x-actor-name";

/// The [`Actor`] making the current HTTP request.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
  let value = parts
    .headers
    .get(name)
    .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))?
    .to_str()
    .map_err(|_| ApiError::BadRequest(format!("{name} header is not valid text")))?
    .trim();
  if value.is_empty() {
    return Err(ApiError::BadRequest(format!("{name} header is empty")));
  }
  Ok(value)
}

impl<S> FromRequestParts<S> for CurrentActor
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let role = Role::parse(header(parts, ROLE_HEADER)?)?;
    let name = header(parts, NAME_HEADER)?;
    Ok(Self(Actor::new(role, name)))
  }
}
