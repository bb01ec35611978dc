//! Handlers for comment write endpoints. Comment changes are filed under the
//! ticket the comment belongs to.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/tickets/{id}/comments` | Body: `{"text":"..."}`, 404 if the ticket is missing |
//! | `PUT`    | `/comments/{id}` | Body: `{"text":"..."}` |
//! | `DELETE` | `/comments/{id}` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use docket_core::{
  change::{ActionKind, Reference},
  entity::{Comment, EntityKind, EntitySnapshot},
};
use serde::Deserialize;

use crate::{
  AppState, Backend,
  actor::Actor,
  error::ApiError,
  write::{Write, commit_write, load_comment, load_ticket},
};

#[derive(Debug, Deserialize)]
pub struct CommentBody {
  pub text: String,
}

impl CommentBody {
  fn text(self) -> Result<String, ApiError> {
    if self.text.trim().is_empty() {
      return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    Ok(self.text)
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /tickets/{id}/comments`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  Path(ticket_id): Path<i64>,
  actor: Actor,
  Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, ApiError> {
  let text = body.text()?;
  load_ticket(&state, ticket_id).await?;

  let comment_id = state
    .store
    .next_id(EntityKind::Comment)
    .await
    .map_err(ApiError::store)?;
  let comment = Comment { comment_id, ticket_id, text };

  let new = EntitySnapshot::from(comment.clone());
  commit_write(&state, &actor, Write {
    old:       None,
    new:       Some(&new),
    action:    ActionKind::Create,
    reference: Reference::ticket(ticket_id),
    marker:    None,
  })
  .await?;

  Ok((StatusCode::CREATED, Json(comment)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /comments/{id}`
pub async fn update<S: Backend>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  actor: Actor,
  Json(body): Json<CommentBody>,
) -> Result<Json<Comment>, ApiError> {
  let text = body.text()?;
  let current = load_comment(&state, id).await?;
  let comment = Comment { text, ..current.clone() };

  let old = EntitySnapshot::from(current);
  let new = EntitySnapshot::from(comment.clone());
  commit_write(&state, &actor, Write {
    old:       Some(&old),
    new:       Some(&new),
    action:    ActionKind::Update,
    reference: Reference::ticket(comment.ticket_id),
    marker:    None,
  })
  .await?;

  Ok(Json(comment))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /comments/{id}`
pub async fn delete<S: Backend>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  actor: Actor,
) -> Result<StatusCode, ApiError> {
  let current = load_comment(&state, id).await?;
  let reference = Reference::ticket(current.ticket_id);

  let old = EntitySnapshot::from(current);
  commit_write(&state, &actor, Write {
    old: Some(&old),
    new: None,
    action: ActionKind::Delete,
    reference,
    marker: Some("Comment deleted"),
  })
  .await?;

  Ok(StatusCode::NO_CONTENT)
}
