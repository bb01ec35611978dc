//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so that text order
//! matches time order (`MAX(changed_at)` and `ORDER BY changed_at` rely on
//! it). Enums are stored by variant name. UUIDs are hyphenated lowercase.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use docket_core::{
  change::{ActionKind, Change, ChangeRecord, NewChangeRecord, Reference},
  entity::{
    Attachment, Comment, EntityKind, EntitySnapshot, Priority, Ticket, TicketStatus,
  },
  unit::EntityWrite,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::from_str(s).map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn encode_entity_kind(k: EntityKind) -> &'static str { k.into() }

pub fn encode_action_kind(k: ActionKind) -> &'static str { k.into() }

pub fn decode_entity_kind(s: &str) -> Result<EntityKind> {
  EntityKind::from_str(s)
    .map_err(|_| docket_core::Error::UnknownEntityKind(s.to_owned()).into())
}

pub fn decode_action_kind(s: &str) -> Result<ActionKind> {
  ActionKind::from_str(s)
    .map_err(|_| docket_core::Error::UnknownActionKind(s.to_owned()).into())
}

fn decode_variant<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode { column, value: s.to_owned() })
}

/// Table and id column holding entities of `kind`.
pub fn entity_table(kind: EntityKind) -> (&'static str, &'static str) {
  match kind {
    EntityKind::Ticket => ("tickets", "ticket_id"),
    EntityKind::Comment => ("comments", "comment_id"),
    EntityKind::Attachment => ("attachments", "attachment_id"),
  }
}

// ─── Change records ──────────────────────────────────────────────────────────

/// Column values of a `change_records` row, ready to bind.
pub struct EncodedChange {
  pub entity_kind:    &'static str,
  pub entity_id:      i64,
  pub change_kind:    &'static str,
  pub field_name:     Option<String>,
  pub old_value:      Option<String>,
  pub new_value:      Option<String>,
  pub message:        Option<String>,
  pub changed_at:     String,
  pub actor_id:       String,
  pub batch_id:       String,
  pub action_kind:    &'static str,
  pub reference_kind: &'static str,
  pub reference_id:   i64,
}

impl From<NewChangeRecord> for EncodedChange {
  fn from(r: NewChangeRecord) -> Self {
    let (change_kind, field_name, old_value, new_value, message) = match r.change {
      Change::Field { field_name, old_value, new_value } => {
        ("field", Some(field_name), old_value, new_value, None)
      }
      Change::Marker { message } => ("marker", None, None, None, Some(message)),
    };

    Self {
      entity_kind: encode_entity_kind(r.entity_kind),
      entity_id: r.entity_id,
      change_kind,
      field_name,
      old_value,
      new_value,
      message,
      changed_at: encode_dt(r.changed_at),
      actor_id: r.actor_id,
      batch_id: encode_uuid(r.batch_id),
      action_kind: encode_action_kind(r.action_kind),
      reference_kind: encode_entity_kind(r.reference.kind),
      reference_id: r.reference.id,
    }
  }
}

/// Column list matching [`RawChangeRecord::from_row`].
pub const CHANGE_COLUMNS: &str = "id, entity_kind, entity_id, change_kind, field_name, \
  old_value, new_value, message, changed_at, actor_id, batch_id, action_kind, \
  reference_kind, reference_id";

/// Raw values read directly from a `change_records` row.
pub struct RawChangeRecord {
  pub id:             i64,
  pub entity_kind:    String,
  pub entity_id:      i64,
  pub change_kind:    String,
  pub field_name:     Option<String>,
  pub old_value:      Option<String>,
  pub new_value:      Option<String>,
  pub message:        Option<String>,
  pub changed_at:     String,
  pub actor_id:       String,
  pub batch_id:       String,
  pub action_kind:    String,
  pub reference_kind: String,
  pub reference_id:   i64,
}

impl RawChangeRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      entity_kind:    row.get(1)?,
      entity_id:      row.get(2)?,
      change_kind:    row.get(3)?,
      field_name:     row.get(4)?,
      old_value:      row.get(5)?,
      new_value:      row.get(6)?,
      message:        row.get(7)?,
      changed_at:     row.get(8)?,
      actor_id:       row.get(9)?,
      batch_id:       row.get(10)?,
      action_kind:    row.get(11)?,
      reference_kind: row.get(12)?,
      reference_id:   row.get(13)?,
    })
  }

  pub fn into_record(self) -> Result<ChangeRecord> {
    let change = match (self.change_kind.as_str(), self.field_name, self.message) {
      ("field", Some(field_name), None) => Change::Field {
        field_name,
        old_value: self.old_value,
        new_value: self.new_value,
      },
      ("marker", None, Some(message)) => Change::Marker { message },
      (other, ..) => {
        return Err(Error::Decode { column: "change_kind", value: other.to_owned() });
      }
    };

    Ok(ChangeRecord {
      id: self.id,
      entity_kind: decode_entity_kind(&self.entity_kind)?,
      entity_id: self.entity_id,
      change,
      changed_at: decode_dt(&self.changed_at)?,
      actor_id: self.actor_id,
      batch_id: decode_uuid(&self.batch_id)?,
      action_kind: decode_action_kind(&self.action_kind)?,
      reference: Reference {
        kind: decode_entity_kind(&self.reference_kind)?,
        id:   self.reference_id,
      },
    })
  }
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// An entity write with its column values encoded, ready to bind.
pub enum EncodedWrite {
  Ticket {
    ticket_id:        i64,
    title:            String,
    description:      Option<String>,
    status:           String,
    priority:         String,
    responsible_name: Option<String>,
    location:         Option<String>,
    due_date:         Option<String>,
  },
  Comment(Comment),
  Attachment(Attachment),
  Delete {
    table:     &'static str,
    id_column: &'static str,
    id:        i64,
  },
}

impl From<EntityWrite> for EncodedWrite {
  fn from(write: EntityWrite) -> Self {
    match write {
      EntityWrite::Put(EntitySnapshot::Ticket(t)) => Self::Ticket {
        ticket_id:        t.ticket_id,
        title:            t.title,
        description:      t.description,
        status:           t.status.to_string(),
        priority:         t.priority.to_string(),
        responsible_name: t.responsible_name,
        location:         t.location,
        due_date:         t.due_date.map(encode_date),
      },
      EntityWrite::Put(EntitySnapshot::Comment(c)) => Self::Comment(c),
      EntityWrite::Put(EntitySnapshot::Attachment(a)) => Self::Attachment(a),
      EntityWrite::Delete { kind, id } => {
        let (table, id_column) = entity_table(kind);
        Self::Delete { table, id_column, id }
      }
    }
  }
}

/// Raw values read directly from a `tickets` row.
pub struct RawTicket {
  pub ticket_id:        i64,
  pub title:            String,
  pub description:      Option<String>,
  pub status:           String,
  pub priority:         String,
  pub responsible_name: Option<String>,
  pub location:         Option<String>,
  pub due_date:         Option<String>,
}

impl RawTicket {
  pub fn into_snapshot(self) -> Result<EntitySnapshot> {
    Ok(EntitySnapshot::Ticket(Ticket {
      ticket_id:        self.ticket_id,
      title:            self.title,
      description:      self.description,
      status:           decode_variant::<TicketStatus>("status", &self.status)?,
      priority:         decode_variant::<Priority>("priority", &self.priority)?,
      responsible_name: self.responsible_name,
      location:         self.location,
      due_date:         self.due_date.as_deref().map(decode_date).transpose()?,
    }))
  }
}

pub fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntitySnapshot> {
  Ok(EntitySnapshot::Comment(Comment {
    comment_id: row.get(0)?,
    ticket_id:  row.get(1)?,
    text:       row.get(2)?,
  }))
}

pub fn attachment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntitySnapshot> {
  Ok(EntitySnapshot::Attachment(Attachment {
    attachment_id: row.get(0)?,
    ticket_id:     row.get(1)?,
    file_name:     row.get(2)?,
    content_type:  row.get(3)?,
    size_bytes:    row.get(4)?,
  }))
}
