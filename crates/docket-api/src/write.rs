//! Shared plumbing for the write endpoints: load the current entity, queue
//! the write and its change records in one unit of work, commit.

use docket_core::{
  change::{ActionKind, Reference},
  emit::{EmitRequest, Emitted, MarkerRequest},
  entity::{Comment, EntityKind, EntitySnapshot, Ticket},
  unit::UnitOfWork,
};

use crate::{AppState, Backend, actor::Actor, error::ApiError};

/// Ticket fields compared on every ticket write.
pub const TICKET_FIELDS: &[&str] = &[
  "Title",
  "Description",
  "Status",
  "Priority",
  "ResponsibleName",
  "Location",
  "DueDate",
];

/// Comment fields compared on every comment write.
pub const COMMENT_FIELDS: &[&str] = &["Text", "TicketId"];

fn audited_fields(kind: EntityKind) -> &'static [&'static str] {
  match kind {
    EntityKind::Ticket => TICKET_FIELDS,
    EntityKind::Comment => COMMENT_FIELDS,
    EntityKind::Attachment => &["FileName", "ContentType", "SizeBytes"],
  }
}

pub async fn load_ticket<S: Backend>(state: &AppState<S>, id: i64) -> Result<Ticket, ApiError> {
  match state.store.get_entity(EntityKind::Ticket, id).await.map_err(ApiError::store)? {
    Some(EntitySnapshot::Ticket(t)) => Ok(t),
    _ => Err(ApiError::NotFound(format!("ticket {id} not found"))),
  }
}

pub async fn load_comment<S: Backend>(state: &AppState<S>, id: i64) -> Result<Comment, ApiError> {
  match state.store.get_entity(EntityKind::Comment, id).await.map_err(ApiError::store)? {
    Some(EntitySnapshot::Comment(c)) => Ok(c),
    _ => Err(ApiError::NotFound(format!("comment {id} not found"))),
  }
}

/// One audited entity write.
pub struct Write<'a> {
  pub old:       Option<&'a EntitySnapshot>,
  pub new:       Option<&'a EntitySnapshot>,
  pub action:    ActionKind,
  pub reference: Reference,
  /// Lifecycle marker appended to the batch, e.g. "Ticket deleted".
  pub marker:    Option<&'a str>,
}

/// Apply `write` to a fresh unit of work together with its change records
/// and commit both atomically.
pub async fn commit_write<S: Backend>(
  state: &AppState<S>,
  actor: &Actor,
  write: Write<'_>,
) -> Result<Emitted, ApiError> {
  let Some(subject) = write.new.or(write.old) else {
    return Err(ApiError::BadRequest("nothing to write".into()));
  };
  let (kind, id) = (subject.kind(), subject.id());

  let mut unit = UnitOfWork::new();
  match write.new {
    Some(snapshot) => unit.put(snapshot.clone()),
    None => unit.delete(kind, id),
  }

  let emitted = state.audit.emit(&mut unit, EmitRequest {
    entity_kind: kind,
    entity_id:   id,
    old:         write.old,
    new:         write.new,
    fields:      audited_fields(kind),
    actor_id:    &actor.0,
    action_kind: write.action,
    batch_id:    None,
    reference:   write.reference,
  })?;

  if let Some(message) = write.marker {
    state.audit.emit_marker(&mut unit, MarkerRequest {
      entity_kind: kind,
      entity_id: id,
      message,
      actor_id: &actor.0,
      action_kind: write.action,
      batch_id: emitted.batch_id,
      reference: write.reference,
    })?;
  }

  state.audit.commit(unit).await?;
  tracing::debug!(
    entity_kind = %kind,
    entity_id = id,
    action = %write.action,
    written = emitted.written,
    "audited write committed"
  );
  Ok(emitted)
}
