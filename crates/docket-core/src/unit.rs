//! [`UnitOfWork`]: the transactional scope shared by an entity mutation
//! and the change records that describe it.
//!
//! Callers queue entity writes and records into one unit and hand it to
//! [`ChangeStore::commit`](crate::store::ChangeStore::commit), which applies
//! everything in a single transaction or nothing at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  change::{ActionKind, NewChangeRecord},
  entity::{EntityKind, EntitySnapshot},
};

/// A pending write against an entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityWrite {
  /// Insert or update the entity described by the snapshot.
  Put(EntitySnapshot),
  Delete { kind: EntityKind, id: i64 },
}

/// Who a batch belongs to. Every record of one batch in a unit must agree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BatchOwner {
  entity_kind: EntityKind,
  entity_id:   i64,
  action_kind: ActionKind,
  actor_id:    String,
}

impl BatchOwner {
  fn of(record: &NewChangeRecord) -> Self {
    Self {
      entity_kind: record.entity_kind,
      entity_id:   record.entity_id,
      action_kind: record.action_kind,
      actor_id:    record.actor_id.clone(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct UnitOfWork {
  changed_at: DateTime<Utc>,
  writes:     Vec<EntityWrite>,
  records:    Vec<NewChangeRecord>,
  batches:    HashMap<Uuid, BatchOwner>,
}

impl Default for UnitOfWork {
  fn default() -> Self { Self::new() }
}

impl UnitOfWork {
  /// A unit whose records are stamped with the current time.
  pub fn new() -> Self { Self::at(Utc::now()) }

  /// A unit whose records are stamped with `changed_at`.
  pub fn at(changed_at: DateTime<Utc>) -> Self {
    Self {
      changed_at,
      writes: Vec::new(),
      records: Vec::new(),
      batches: HashMap::new(),
    }
  }

  pub fn changed_at(&self) -> DateTime<Utc> { self.changed_at }

  pub fn put(&mut self, snapshot: impl Into<EntitySnapshot>) {
    self.writes.push(EntityWrite::Put(snapshot.into()));
  }

  pub fn delete(&mut self, kind: EntityKind, id: i64) {
    self.writes.push(EntityWrite::Delete { kind, id });
  }

  /// Queue a change record.
  ///
  /// Fails with [`Error::HeterogeneousBatch`] if the record's batch id was
  /// already used in this unit for a different entity, action or actor.
  pub fn push(&mut self, record: NewChangeRecord) -> Result<()> {
    let owner = BatchOwner::of(&record);
    match self.batches.get(&record.batch_id) {
      Some(existing) if *existing != owner => {
        return Err(Error::HeterogeneousBatch(record.batch_id));
      }
      Some(_) => {}
      None => {
        self.batches.insert(record.batch_id, owner);
      }
    }
    self.records.push(record);
    Ok(())
  }

  pub fn records(&self) -> &[NewChangeRecord] { &self.records }

  pub fn is_empty(&self) -> bool { self.writes.is_empty() && self.records.is_empty() }

  pub fn into_parts(self) -> (Vec<EntityWrite>, Vec<NewChangeRecord>) {
    (self.writes, self.records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::change::{Change, Reference};

  fn record(batch_id: Uuid, entity_id: i64, actor: &str) -> NewChangeRecord {
    NewChangeRecord {
      entity_kind: EntityKind::Ticket,
      entity_id,
      change: Change::field("Title", None, Some("x".into())),
      changed_at: Utc::now(),
      actor_id: actor.into(),
      batch_id,
      action_kind: ActionKind::Create,
      reference: Reference::ticket(entity_id),
    }
  }

  #[test]
  fn records_of_one_owner_share_a_batch() {
    let mut unit = UnitOfWork::new();
    let batch = Uuid::new_v4();
    unit.push(record(batch, 1, "alice")).unwrap();
    unit.push(record(batch, 1, "alice")).unwrap();
    assert_eq!(unit.records().len(), 2);
  }

  #[test]
  fn mixing_entities_in_one_batch_is_rejected() {
    let mut unit = UnitOfWork::new();
    let batch = Uuid::new_v4();
    unit.push(record(batch, 1, "alice")).unwrap();

    let err = unit.push(record(batch, 2, "alice")).unwrap_err();
    assert!(matches!(err, Error::HeterogeneousBatch(id) if id == batch));

    let err = unit.push(record(batch, 1, "bob")).unwrap_err();
    assert!(matches!(err, Error::HeterogeneousBatch(_)));
    assert_eq!(unit.records().len(), 1);
  }

  #[test]
  fn empty_unit() {
    let mut unit = UnitOfWork::default();
    assert!(unit.is_empty());
    unit.delete(EntityKind::Comment, 3);
    assert!(!unit.is_empty());
    let (writes, records) = unit.into_parts();
    assert_eq!(writes, vec![EntityWrite::Delete { kind: EntityKind::Comment, id: 3 }]);
    assert!(records.is_empty());
  }
}
