//! Read-side projections of the audit log: timeline entries, field changes
//! and the presentation policy that shapes them.
//!
//! Nothing in this module is persisted; every value is recomputed per query.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  change::{ActionKind, Change, ChangeRecord},
  entity::EntityKind,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// One field change as shown to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
  pub field_name:   String,
  pub old_value:    Option<String>,
  pub new_value:    Option<String>,
  pub is_important: bool,
}

/// One batch of change records, reconstructed for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
  pub batch_id:           Uuid,
  /// Latest `changed_at` across the batch's records.
  pub changed_at:         DateTime<Utc>,
  pub changed_by_user_id: String,
  pub changed_by_user:    String,
  pub action_kind:        ActionKind,
  pub entity_kind:        EntityKind,
  pub entity_id:          i64,
  /// Whether the changed entity still exists right now.
  pub entity_exists:      bool,
  pub changes:            Vec<FieldChange>,
  /// Lifecycle marker messages recorded in the batch.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub markers:            Vec<String>,
}

/// A page of results plus the total number of items across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
  pub total_count: u64,
  pub page:        u32,
  pub page_size:   u32,
  pub items:       Vec<T>,
}

impl<T> PagedResult<T> {
  pub fn empty(page: u32, page_size: u32) -> Self {
    Self { total_count: 0, page, page_size, items: Vec::new() }
  }
}

// ─── Presentation policy ─────────────────────────────────────────────────────

/// How field values are shaped before they leave the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelinePolicy {
  /// Longest value (in characters) shown in timeline pages.
  pub timeline_preview_len: usize,
  /// Longest value (in characters) shown in batch detail.
  pub detail_preview_len:   usize,
  /// Sent in place of any value longer than the applicable limit.
  pub placeholder:          String,
  pub important_fields:     BTreeSet<String>,
}

impl Default for TimelinePolicy {
  fn default() -> Self {
    Self {
      timeline_preview_len: 100,
      detail_preview_len:   500,
      placeholder:          "[value too long to display]".to_owned(),
      important_fields:     ["Title", "Status", "ResponsibleName"]
        .into_iter()
        .map(str::to_owned)
        .collect(),
    }
  }
}

impl TimelinePolicy {
  pub fn is_important(&self, field_name: &str) -> bool {
    self.important_fields.contains(field_name)
  }

  /// Replace `value` with the placeholder if it is longer than `limit`.
  /// Values are never cut to a prefix.
  pub fn preview(&self, value: Option<String>, limit: usize) -> Option<String> {
    value.map(|v| {
      if v.chars().count() > limit { self.placeholder.clone() } else { v }
    })
  }

  /// Project a field record to a [`FieldChange`]. Markers yield `None`.
  pub fn project(&self, record: &ChangeRecord, limit: usize) -> Option<FieldChange> {
    match &record.change {
      Change::Field { field_name, old_value, new_value } => Some(FieldChange {
        field_name:   field_name.clone(),
        old_value:    self.preview(old_value.clone(), limit),
        new_value:    self.preview(new_value.clone(), limit),
        is_important: self.is_important(field_name),
      }),
      Change::Marker { .. } => None,
    }
  }
}

// ─── Batches ─────────────────────────────────────────────────────────────────

/// The records of one batch together with the metadata taken from its
/// representative (earliest) record.
#[derive(Debug, Clone)]
pub struct Batch {
  pub batch_id:    Uuid,
  pub entity_kind: EntityKind,
  pub entity_id:   i64,
  pub action_kind: ActionKind,
  pub actor_id:    String,
  /// Latest `changed_at` across the records.
  pub changed_at:  DateTime<Utc>,
  /// Ordered by `(changed_at, id)`.
  records:         Vec<ChangeRecord>,
}

impl Batch {
  /// Build a batch from its records. Returns `None` for an empty set.
  pub fn from_records(mut records: Vec<ChangeRecord>) -> Option<Self> {
    records.sort_by_key(ChangeRecord::sequence_key);
    let representative = records.first()?;
    let changed_at = records.iter().map(|r| r.changed_at).max()?;

    Some(Self {
      batch_id: representative.batch_id,
      entity_kind: representative.entity_kind,
      entity_id: representative.entity_id,
      action_kind: representative.action_kind,
      actor_id: representative.actor_id.clone(),
      changed_at,
      records,
    })
  }

  /// Split `records` into batches, ordered like `batch_ids`. Ids with no
  /// records are skipped; records of unlisted batches are dropped.
  pub fn group(records: Vec<ChangeRecord>, batch_ids: &[Uuid]) -> Vec<Self> {
    let mut by_batch: HashMap<Uuid, Vec<ChangeRecord>> = HashMap::new();
    for record in records {
      by_batch.entry(record.batch_id).or_default().push(record);
    }

    batch_ids
      .iter()
      .filter_map(|id| by_batch.remove(id))
      .filter_map(Self::from_records)
      .collect()
  }

  pub fn records(&self) -> &[ChangeRecord] { &self.records }

  /// Whether every record agrees with the representative on entity, action
  /// and actor.
  pub fn is_homogeneous(&self) -> bool {
    self.records.iter().all(|r| {
      r.entity_kind == self.entity_kind
        && r.entity_id == self.entity_id
        && r.action_kind == self.action_kind
        && r.actor_id == self.actor_id
    })
  }

  pub fn into_entry(
    self,
    entity_exists: bool,
    changed_by_user: String,
    policy: &TimelinePolicy,
  ) -> TimelineEntry {
    let changes = self
      .records
      .iter()
      .filter_map(|r| policy.project(r, policy.timeline_preview_len))
      .collect();
    let markers = self
      .records
      .iter()
      .filter_map(|r| match &r.change {
        Change::Marker { message } => Some(message.clone()),
        Change::Field { .. } => None,
      })
      .collect();

    TimelineEntry {
      batch_id: self.batch_id,
      changed_at: self.changed_at,
      changed_by_user_id: self.actor_id,
      changed_by_user,
      action_kind: self.action_kind,
      entity_kind: self.entity_kind,
      entity_id: self.entity_id,
      entity_exists,
      changes,
      markers,
    }
  }
}
