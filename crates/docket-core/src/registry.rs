//! Typed field registry used by the diff engine.
//!
//! Every auditable field is registered once as `(kind, name) -> accessor`.
//! Reading an unregistered field is an error, never a silent `None`.

use std::collections::{BTreeMap, HashMap};

use crate::{
  Error, Result,
  entity::{Attachment, Comment, EntityKind, EntitySnapshot, Ticket},
};

/// A stringifying accessor for one field of one entity type.
#[derive(Clone, Copy)]
enum Accessor {
  Ticket(fn(&Ticket) -> Option<String>),
  Comment(fn(&Comment) -> Option<String>),
  Attachment(fn(&Attachment) -> Option<String>),
}

impl Accessor {
  fn kind(self) -> EntityKind {
    match self {
      Self::Ticket(_) => EntityKind::Ticket,
      Self::Comment(_) => EntityKind::Comment,
      Self::Attachment(_) => EntityKind::Attachment,
    }
  }

  fn read(self, snapshot: &EntitySnapshot) -> Result<Option<String>> {
    match (self, snapshot) {
      (Self::Ticket(f), EntitySnapshot::Ticket(t)) => Ok(f(t)),
      (Self::Comment(f), EntitySnapshot::Comment(c)) => Ok(f(c)),
      (Self::Attachment(f), EntitySnapshot::Attachment(a)) => Ok(f(a)),
      (accessor, snapshot) => Err(Error::SnapshotKindMismatch {
        expected: accessor.kind(),
        actual:   snapshot.kind(),
      }),
    }
  }
}

/// Maps `(entity kind, field name)` to a typed accessor.
#[derive(Clone, Default)]
pub struct FieldRegistry {
  fields: HashMap<EntityKind, BTreeMap<&'static str, Accessor>>,
}

impl FieldRegistry {
  pub fn empty() -> Self { Self::default() }

  /// The registry for every auditable field of tickets, comments and
  /// attachments.
  pub fn standard() -> Self {
    let mut registry = Self::empty();

    registry
      .ticket("Title", |t| Some(t.title.clone()))
      .ticket("Description", |t| t.description.clone())
      .ticket("Status", |t| Some(t.status.to_string()))
      .ticket("Priority", |t| Some(t.priority.to_string()))
      .ticket("ResponsibleName", |t| t.responsible_name.clone())
      .ticket("Location", |t| t.location.clone())
      .ticket("DueDate", |t| t.due_date.map(|d| d.to_string()));

    registry
      .comment("Text", |c| Some(c.text.clone()))
      .comment("TicketId", |c| Some(c.ticket_id.to_string()));

    registry
      .attachment("FileName", |a| Some(a.file_name.clone()))
      .attachment("ContentType", |a| Some(a.content_type.clone()))
      .attachment("SizeBytes", |a| Some(a.size_bytes.to_string()));

    registry
  }

  pub fn ticket(
    &mut self,
    name: &'static str,
    accessor: fn(&Ticket) -> Option<String>,
  ) -> &mut Self {
    self.insert(name, Accessor::Ticket(accessor))
  }

  pub fn comment(
    &mut self,
    name: &'static str,
    accessor: fn(&Comment) -> Option<String>,
  ) -> &mut Self {
    self.insert(name, Accessor::Comment(accessor))
  }

  pub fn attachment(
    &mut self,
    name: &'static str,
    accessor: fn(&Attachment) -> Option<String>,
  ) -> &mut Self {
    self.insert(name, Accessor::Attachment(accessor))
  }

  fn insert(&mut self, name: &'static str, accessor: Accessor) -> &mut Self {
    self
      .fields
      .entry(accessor.kind())
      .or_default()
      .insert(name, accessor);
    self
  }

  pub fn contains(&self, kind: EntityKind, field: &str) -> bool {
    self.fields.get(&kind).is_some_and(|m| m.contains_key(field))
  }

  /// Read `field` from `snapshot`, stringified.
  ///
  /// Fails with [`Error::UnknownField`] if the field is not registered for
  /// the snapshot's kind.
  pub fn read(&self, snapshot: &EntitySnapshot, field: &str) -> Result<Option<String>> {
    let accessor = self
      .fields
      .get(&snapshot.kind())
      .and_then(|m| m.get(field))
      .ok_or_else(|| Error::UnknownField {
        kind:  snapshot.kind(),
        field: field.to_owned(),
      })?;
    accessor.read(snapshot)
  }
}

impl std::fmt::Debug for FieldRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut map = f.debug_map();
    for (kind, fields) in &self.fields {
      map.entry(kind, &fields.keys().collect::<Vec<_>>());
    }
    map.finish()
  }
}
