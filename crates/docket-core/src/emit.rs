//! Diff & emit: the write path of the audit log.
//!
//! Given before/after snapshots of one entity, decide which fields changed
//! and queue one [`NewChangeRecord`] per change into a [`UnitOfWork`].
//! Untouched fields are never logged.

use uuid::Uuid;

use crate::{
  Error, Result,
  change::{ActionKind, Change, NewChangeRecord, Reference},
  entity::{EntityKind, EntitySnapshot},
  registry::FieldRegistry,
  unit::UnitOfWork,
};

/// Parameters for [`emit`].
#[derive(Debug, Clone)]
pub struct EmitRequest<'a> {
  pub entity_kind: EntityKind,
  pub entity_id:   i64,
  pub old:         Option<&'a EntitySnapshot>,
  pub new:         Option<&'a EntitySnapshot>,
  /// Fields to compare; each must be registered for `entity_kind`.
  pub fields:      &'a [&'a str],
  pub actor_id:    &'a str,
  pub action_kind: ActionKind,
  /// Batch to file the records under. A fresh id is generated when `None`.
  pub batch_id:    Option<Uuid>,
  pub reference:   Reference,
}

/// What an [`emit`] call queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitted {
  pub batch_id: Uuid,
  pub written:  usize,
}

/// Whether a field change is worth persisting for `action`.
///
/// - `Create`: only when the new value is non-empty.
/// - `Delete`: only when the old value is non-empty.
/// - `Update`: only when the string values differ.
pub fn should_emit(action: ActionKind, old: Option<&str>, new: Option<&str>) -> bool {
  fn present(v: Option<&str>) -> bool { v.is_some_and(|s| !s.is_empty()) }

  match action {
    ActionKind::Create => present(new),
    ActionKind::Delete => present(old),
    ActionKind::Update => old != new,
  }
}

/// Diff `req.old` against `req.new` field by field and queue the changes.
pub fn emit(
  registry: &FieldRegistry,
  unit: &mut UnitOfWork,
  req: EmitRequest<'_>,
) -> Result<Emitted> {
  for snapshot in [req.old, req.new].into_iter().flatten() {
    if snapshot.kind() != req.entity_kind {
      return Err(Error::SnapshotKindMismatch {
        expected: req.entity_kind,
        actual:   snapshot.kind(),
      });
    }
  }

  if let Some(field) = req
    .fields
    .iter()
    .find(|f| !registry.contains(req.entity_kind, f))
  {
    return Err(Error::UnknownField {
      kind:  req.entity_kind,
      field: (*field).to_owned(),
    });
  }

  let batch_id = req.batch_id.unwrap_or_else(Uuid::new_v4);
  let mut written = 0;

  for &field in req.fields {
    let old_value = req.old.map(|s| registry.read(s, field)).transpose()?.flatten();
    let new_value = req.new.map(|s| registry.read(s, field)).transpose()?.flatten();

    if !should_emit(req.action_kind, old_value.as_deref(), new_value.as_deref()) {
      continue;
    }

    unit.push(NewChangeRecord {
      entity_kind: req.entity_kind,
      entity_id:   req.entity_id,
      change:      Change::field(field, old_value, new_value),
      changed_at:  unit.changed_at(),
      actor_id:    req.actor_id.to_owned(),
      batch_id,
      action_kind: req.action_kind,
      reference:   req.reference,
    })?;
    written += 1;
  }

  tracing::debug!(
    %batch_id,
    entity_kind = %req.entity_kind,
    entity_id = req.entity_id,
    action = %req.action_kind,
    written,
    "queued field changes"
  );

  Ok(Emitted { batch_id, written })
}

/// Queue a single ad hoc field change under a fresh batch.
///
/// Bypasses the snapshot diff: the record is written even when `old` and
/// `new` are equal. The action is always [`ActionKind::Update`] and the
/// change is filed under the entity itself.
pub fn emit_one(
  unit: &mut UnitOfWork,
  entity_kind: EntityKind,
  entity_id: i64,
  field_name: &str,
  old: Option<String>,
  new: Option<String>,
  actor_id: &str,
) -> Result<Uuid> {
  let batch_id = Uuid::new_v4();
  unit.push(NewChangeRecord {
    entity_kind,
    entity_id,
    change: Change::field(field_name, old, new),
    changed_at: unit.changed_at(),
    actor_id: actor_id.to_owned(),
    batch_id,
    action_kind: ActionKind::Update,
    reference: Reference::new(entity_kind, entity_id),
  })?;
  Ok(batch_id)
}

/// Parameters for [`emit_marker`].
#[derive(Debug, Clone)]
pub struct MarkerRequest<'a> {
  pub entity_kind: EntityKind,
  pub entity_id:   i64,
  pub message:     &'a str,
  pub actor_id:    &'a str,
  pub action_kind: ActionKind,
  pub batch_id:    Uuid,
  pub reference:   Reference,
}

/// Queue a lifecycle marker (e.g. "Ticket deleted") into an existing batch.
pub fn emit_marker(unit: &mut UnitOfWork, req: MarkerRequest<'_>) -> Result<()> {
  unit.push(NewChangeRecord {
    entity_kind: req.entity_kind,
    entity_id:   req.entity_id,
    change:      Change::Marker { message: req.message.to_owned() },
    changed_at:  unit.changed_at(),
    actor_id:    req.actor_id.to_owned(),
    batch_id:    req.batch_id,
    action_kind: req.action_kind,
    reference:   req.reference,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::{Comment, Priority, Ticket, TicketStatus};

  const TICKET_FIELDS: &[&str] = &["Title", "Status", "Description"];

  fn ticket(title: &str, status: TicketStatus) -> EntitySnapshot {
    EntitySnapshot::Ticket(Ticket {
      ticket_id:        10,
      title:            title.into(),
      description:      None,
      status,
      priority:         Priority::Medium,
      responsible_name: None,
      location:         None,
      due_date:         None,
    })
  }

  fn request<'a>(
    old: Option<&'a EntitySnapshot>,
    new: Option<&'a EntitySnapshot>,
    action_kind: ActionKind,
  ) -> EmitRequest<'a> {
    EmitRequest {
      entity_kind: EntityKind::Ticket,
      entity_id: 10,
      old,
      new,
      fields: TICKET_FIELDS,
      actor_id: "alice",
      action_kind,
      batch_id: None,
      reference: Reference::ticket(10),
    }
  }

  fn changed_fields(unit: &UnitOfWork) -> Vec<&str> {
    unit
      .records()
      .iter()
      .filter_map(|r| r.change.field_name())
      .collect()
  }

  #[test]
  fn policy_per_action() {
    assert!(should_emit(ActionKind::Create, None, Some("x")));
    assert!(!should_emit(ActionKind::Create, None, Some("")));
    assert!(!should_emit(ActionKind::Create, None, None));

    assert!(should_emit(ActionKind::Delete, Some("x"), None));
    assert!(!should_emit(ActionKind::Delete, Some(""), None));

    assert!(should_emit(ActionKind::Update, Some("a"), Some("b")));
    assert!(should_emit(ActionKind::Update, None, Some("b")));
    assert!(!should_emit(ActionKind::Update, Some("a"), Some("a")));
    assert!(!should_emit(ActionKind::Update, None, None));
  }

  #[test]
  fn create_skips_empty_fields() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let new = ticket("Pump leak", TicketStatus::Open);

    let emitted =
      emit(&registry, &mut unit, request(None, Some(&new), ActionKind::Create)).unwrap();

    assert_eq!(emitted.written, 2);
    assert_eq!(changed_fields(&unit), vec!["Title", "Status"]);
    assert!(unit.records().iter().all(|r| r.batch_id == emitted.batch_id));
  }

  #[test]
  fn update_writes_only_differing_fields() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let old = ticket("Pump leak", TicketStatus::Open);
    let new = ticket("Pump leak", TicketStatus::InProgress);
    let batch = Uuid::new_v4();

    let mut req = request(Some(&old), Some(&new), ActionKind::Update);
    req.batch_id = Some(batch);
    let emitted = emit(&registry, &mut unit, req).unwrap();

    assert_eq!(emitted, Emitted { batch_id: batch, written: 1 });
    let record = &unit.records()[0];
    assert_eq!(
      record.change,
      Change::field("Status", Some("Open".into()), Some("InProgress".into()))
    );
    assert_eq!(record.changed_at, unit.changed_at());
  }

  #[test]
  fn identical_snapshots_write_nothing() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let t = ticket("Pump leak", TicketStatus::Open);

    let emitted =
      emit(&registry, &mut unit, request(Some(&t), Some(&t), ActionKind::Update)).unwrap();
    assert_eq!(emitted.written, 0);
    assert!(unit.is_empty());
  }

  #[test]
  fn delete_records_old_values() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let old = ticket("Pump leak", TicketStatus::Resolved);

    emit(&registry, &mut unit, request(Some(&old), None, ActionKind::Delete)).unwrap();

    assert_eq!(changed_fields(&unit), vec!["Title", "Status"]);
    assert!(unit.records().iter().all(|r| matches!(
      r.change,
      Change::Field { old_value: Some(_), new_value: None, .. }
    )));
  }

  #[test]
  fn unknown_field_fails_before_queueing() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let new = ticket("Pump leak", TicketStatus::Open);
    let mut req = request(None, Some(&new), ActionKind::Create);
    req.fields = &["Title", "Severity"];

    assert!(matches!(
      emit(&registry, &mut unit, req),
      Err(Error::UnknownField { .. })
    ));
    assert!(unit.is_empty());
  }

  #[test]
  fn snapshot_of_wrong_kind_fails() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let comment = EntitySnapshot::Comment(Comment {
      comment_id: 1,
      ticket_id:  10,
      text:       "hi".into(),
    });

    let err = emit(&registry, &mut unit, request(None, Some(&comment), ActionKind::Create))
      .unwrap_err();
    assert!(matches!(
      err,
      Error::SnapshotKindMismatch { expected: EntityKind::Ticket, actual: EntityKind::Comment }
    ));
  }

  #[test]
  fn emit_one_always_writes_an_update() {
    let mut unit = UnitOfWork::new();
    let batch = emit_one(
      &mut unit,
      EntityKind::Ticket,
      4,
      "Status",
      Some("Open".into()),
      Some("Open".into()),
      "system",
    )
    .unwrap();

    let record = &unit.records()[0];
    assert_eq!(record.batch_id, batch);
    assert_eq!(record.action_kind, ActionKind::Update);
    assert_eq!(record.reference, Reference::ticket(4));
  }

  #[test]
  fn marker_joins_an_existing_batch() {
    let registry = FieldRegistry::standard();
    let mut unit = UnitOfWork::new();
    let old = ticket("Pump leak", TicketStatus::Open);
    let emitted =
      emit(&registry, &mut unit, request(Some(&old), None, ActionKind::Delete)).unwrap();

    emit_marker(&mut unit, MarkerRequest {
      entity_kind: EntityKind::Ticket,
      entity_id:   10,
      message:     "Ticket deleted",
      actor_id:    "alice",
      action_kind: ActionKind::Delete,
      batch_id:    emitted.batch_id,
      reference:   Reference::ticket(10),
    })
    .unwrap();

    let last = unit.records().last().unwrap();
    assert_eq!(last.change, Change::Marker { message: "Ticket deleted".into() });
    assert_eq!(last.batch_id, emitted.batch_id);
  }
}
