//! The `x-actor-id` header extractor.
//!
//! Authentication is left to whatever sits in front of the API; handlers only
//! need to know who to attribute a change to.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user a write request is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(ACTOR_HEADER)
      .ok_or_else(|| ApiError::BadRequest(format!("missing {ACTOR_HEADER} header")))?
      .to_str()
      .map_err(|_| ApiError::BadRequest(format!("{ACTOR_HEADER} is not valid text")))?
      .trim();

    if value.is_empty() {
      return Err(ApiError::BadRequest(format!("{ACTOR_HEADER} is empty")));
    }
    Ok(Actor(value.to_owned()))
  }
}
