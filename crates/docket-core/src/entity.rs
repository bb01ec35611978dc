//! Entities whose changes the audit engine records.
//!
//! The engine never persists these itself. It is handed snapshots to diff
//! and asks an [`EntityOracle`](crate::store::EntityOracle) whether a given
//! id still exists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The concrete kind of an audited entity. Also used as the reference kind
/// a change is filed under.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum EntityKind {
  Ticket,
  Comment,
  Attachment,
}

// ─── Ticket ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum TicketStatus {
  #[default]
  Open,
  InProgress,
  Resolved,
  Closed,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Critical,
}

/// An incident ticket; the aggregate root of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
  pub ticket_id:        i64,
  pub title:            String,
  pub description:      Option<String>,
  pub status:           TicketStatus,
  pub priority:         Priority,
  /// Display name of the person currently responsible for the incident.
  pub responsible_name: Option<String>,
  pub location:         Option<String>,
  pub due_date:         Option<NaiveDate>,
}

// ─── Comment ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub comment_id: i64,
  pub ticket_id:  i64,
  pub text:       String,
}

// ─── Attachment ──────────────────────────────────────────────────────────────

/// Metadata of a file attached to a ticket. The blob itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub attachment_id: i64,
  pub ticket_id:     i64,
  pub file_name:     String,
  pub content_type:  String,
  pub size_bytes:    i64,
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The state of one entity at a point in time, as handed to the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EntitySnapshot {
  Ticket(Ticket),
  Comment(Comment),
  Attachment(Attachment),
}

impl EntitySnapshot {
  pub fn kind(&self) -> EntityKind {
    match self {
      Self::Ticket(_) => EntityKind::Ticket,
      Self::Comment(_) => EntityKind::Comment,
      Self::Attachment(_) => EntityKind::Attachment,
    }
  }

  pub fn id(&self) -> i64 {
    match self {
      Self::Ticket(t) => t.ticket_id,
      Self::Comment(c) => c.comment_id,
      Self::Attachment(a) => a.attachment_id,
    }
  }
}

impl From<Ticket> for EntitySnapshot {
  fn from(t: Ticket) -> Self { Self::Ticket(t) }
}

impl From<Comment> for EntitySnapshot {
  fn from(c: Comment) -> Self { Self::Comment(c) }
}

impl From<Attachment> for EntitySnapshot {
  fn from(a: Attachment) -> Self { Self::Attachment(a) }
}

// ─── Actors ──────────────────────────────────────────────────────────────────

/// A user who can appear as the actor of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub user_id:      String,
  pub display_name: String,
}
