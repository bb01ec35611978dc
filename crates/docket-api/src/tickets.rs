//! Handlers for `/tickets` write endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/tickets` | Body: ticket fields, `title` required |
//! | `PUT`    | `/tickets/{id}` | Replaces the ticket; absent status/priority are kept |
//! | `DELETE` | `/tickets/{id}` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use docket_core::{
  change::{ActionKind, Reference},
  entity::{EntityKind, EntitySnapshot, Priority, Ticket, TicketStatus},
};
use serde::Deserialize;

use crate::{
  AppState, Backend,
  actor::Actor,
  error::ApiError,
  write::{Write, commit_write, load_ticket},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketBody {
  pub title:            String,
  pub description:      Option<String>,
  pub status:           Option<TicketStatus>,
  pub priority:         Option<Priority>,
  pub responsible_name: Option<String>,
  pub location:         Option<String>,
  pub due_date:         Option<NaiveDate>,
}

impl TicketBody {
  fn validate(&self) -> Result<(), ApiError> {
    if self.title.trim().is_empty() {
      return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    Ok(())
  }

  /// The ticket this body describes. Status and priority fall back to
  /// `current`'s, then to the defaults.
  fn into_ticket(self, ticket_id: i64, current: Option<&Ticket>) -> Ticket {
    Ticket {
      ticket_id,
      title: self.title.trim().to_owned(),
      description: self.description,
      status: self
        .status
        .or(current.map(|t| t.status))
        .unwrap_or_default(),
      priority: self
        .priority
        .or(current.map(|t| t.priority))
        .unwrap_or_default(),
      responsible_name: self.responsible_name,
      location: self.location,
      due_date: self.due_date,
    }
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /tickets`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<TicketBody>,
) -> Result<impl IntoResponse, ApiError> {
  // Validate before reserving an id.
  body.validate()?;
  let ticket_id = state
    .store
    .next_id(EntityKind::Ticket)
    .await
    .map_err(ApiError::store)?;
  let ticket = body.into_ticket(ticket_id, None);

  let new = EntitySnapshot::from(ticket.clone());
  commit_write(&state, &actor, Write {
    old:       None,
    new:       Some(&new),
    action:    ActionKind::Create,
    reference: Reference::ticket(ticket_id),
    marker:    None,
  })
  .await?;

  Ok((StatusCode::CREATED, Json(ticket)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /tickets/{id}`
pub async fn update<S: Backend>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  actor: Actor,
  Json(body): Json<TicketBody>,
) -> Result<Json<Ticket>, ApiError> {
  body.validate()?;
  let current = load_ticket(&state, id).await?;
  let ticket = body.into_ticket(id, Some(&current));

  let old = EntitySnapshot::from(current);
  let new = EntitySnapshot::from(ticket.clone());
  commit_write(&state, &actor, Write {
    old:       Some(&old),
    new:       Some(&new),
    action:    ActionKind::Update,
    reference: Reference::ticket(id),
    marker:    None,
  })
  .await?;

  Ok(Json(ticket))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /tickets/{id}`
pub async fn delete<S: Backend>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  actor: Actor,
) -> Result<StatusCode, ApiError> {
  let old = EntitySnapshot::from(load_ticket(&state, id).await?);
  commit_write(&state, &actor, Write {
    old:       Some(&old),
    new:       None,
    action:    ActionKind::Delete,
    reference: Reference::ticket(id),
    marker:    Some("Ticket deleted"),
  })
  .await?;

  Ok(StatusCode::NO_CONTENT)
}
