//! `PUT /users/{id}`: create or rename an actor. Not audited.

use axum::{
  Json,
  extract::{Path, State},
};
use docket_core::entity::User;
use serde::Deserialize;

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
  pub display_name: String,
}

pub async fn upsert<S: Backend>(
  State(state): State<AppState<S>>,
  Path(user_id): Path<String>,
  Json(body): Json<UserBody>,
) -> Result<Json<User>, ApiError> {
  let display_name = body.display_name.trim();
  if display_name.is_empty() {
    return Err(ApiError::BadRequest("displayName must not be empty".into()));
  }

  let user = User { user_id, display_name: display_name.to_owned() };
  state
    .store
    .upsert_user(user.clone())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}
