//! Change records, the append-only unit of the audit log.
//!
//! One record is written per changed field, plus an optional lifecycle
//! marker per batch. Records are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::entity::EntityKind;

/// The kind of logical operation a batch of records describes.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum ActionKind {
  Create,
  Update,
  Delete,
}

/// The aggregate root a change is displayed under.
///
/// A comment's changes are filed under its parent ticket so that both surface
/// on one timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
  pub kind: EntityKind,
  pub id:   i64,
}

impl Reference {
  pub fn new(kind: EntityKind, id: i64) -> Self { Self { kind, id } }

  pub fn ticket(id: i64) -> Self { Self::new(EntityKind::Ticket, id) }
}

/// What a single record says about its entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
  /// One field moved from `old_value` to `new_value`.
  Field {
    field_name: String,
    old_value:  Option<String>,
    new_value:  Option<String>,
  },
  /// A lifecycle event with no field attached, e.g. "Ticket deleted".
  Marker { message: String },
}

impl Change {
  pub fn field(
    field_name: impl Into<String>,
    old_value: Option<String>,
    new_value: Option<String>,
  ) -> Self {
    Self::Field { field_name: field_name.into(), old_value, new_value }
  }

  pub fn field_name(&self) -> Option<&str> {
    match self {
      Self::Field { field_name, .. } => Some(field_name),
      Self::Marker { .. } => None,
    }
  }
}

/// A change record that has not been written yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChangeRecord {
  pub entity_kind: EntityKind,
  pub entity_id:   i64,
  pub change:      Change,
  pub changed_at:  DateTime<Utc>,
  pub actor_id:    String,
  pub batch_id:    Uuid,
  pub action_kind: ActionKind,
  pub reference:   Reference,
}

/// A persisted change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
  /// Monotonically increasing; only used to break ties on `changed_at`.
  pub id:          i64,
  pub entity_kind: EntityKind,
  pub entity_id:   i64,
  pub change:      Change,
  pub changed_at:  DateTime<Utc>,
  pub actor_id:    String,
  pub batch_id:    Uuid,
  pub action_kind: ActionKind,
  pub reference:   Reference,
}

impl ChangeRecord {
  pub fn from_new(id: i64, record: NewChangeRecord) -> Self {
    Self {
      id,
      entity_kind: record.entity_kind,
      entity_id: record.entity_id,
      change: record.change,
      changed_at: record.changed_at,
      actor_id: record.actor_id,
      batch_id: record.batch_id,
      action_kind: record.action_kind,
      reference: record.reference,
    }
  }

  /// Ordering key used to pick a batch's representative record.
  pub fn sequence_key(&self) -> (DateTime<Utc>, i64) { (self.changed_at, self.id) }
}
