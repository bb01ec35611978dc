//! Collaborator traits the audit engine depends on.
//!
//! The traits are implemented by storage backends (e.g.
//! `docket-store-sqlite`). The engine itself never talks to a database.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{
  collections::{HashMap, HashSet},
  future::Future,
};

use uuid::Uuid;

use crate::{
  change::{ChangeRecord, Reference},
  entity::{EntityKind, EntitySnapshot, User},
  unit::UnitOfWork,
};

// ─── Change records ──────────────────────────────────────────────────────────

/// Append-only storage of change records with the query primitives the
/// timeline needs.
pub trait ChangeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Apply every entity write and append every change record in `unit`
  /// atomically. Returns the ids assigned to the records, in order.
  fn commit(
    &self,
    unit: UnitOfWork,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  /// Number of distinct batches filed under `reference`.
  fn count_batches(
    &self,
    reference: Reference,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Ids of one page of batches filed under `reference`, newest first by
  /// the latest `changed_at` of each batch, then by the highest record id.
  fn page_batches(
    &self,
    reference: Reference,
    offset: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Every record belonging to any of `batch_ids`, ordered by
  /// `(changed_at, id)`.
  fn records_for_batches<'a>(
    &'a self,
    batch_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<ChangeRecord>, Self::Error>> + Send + 'a;

  /// Every record of one batch, ordered by field name (markers first), then
  /// id.
  fn records_for_batch(
    &self,
    batch_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChangeRecord>, Self::Error>> + Send + '_;
}

// ─── Existence ───────────────────────────────────────────────────────────────

/// Answers "which of these ids currently exist?" for one entity kind.
pub trait EntityOracle: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn existing_ids<'a>(
    &'a self,
    kind: EntityKind,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<HashSet<i64>, Self::Error>> + Send + 'a;
}

// ─── Actors ──────────────────────────────────────────────────────────────────

/// Resolves actor ids to display names.
pub trait ActorDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Display names for the given ids. Unknown ids are absent from the map.
  fn display_names<'a>(
    &'a self,
    actor_ids: &'a [String],
  ) -> impl Future<Output = Result<HashMap<String, String>, Self::Error>> + Send + 'a;
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// The plain entity reads and id allocation the write endpoints need.
/// Entity writes themselves go through [`UnitOfWork`].
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Reserve a fresh id for a new entity of `kind`.
  fn next_id(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Retrieve an entity by kind and id. Returns `None` if not found.
  fn get_entity(
    &self,
    kind: EntityKind,
    id: i64,
  ) -> impl Future<Output = Result<Option<EntitySnapshot>, Self::Error>> + Send + '_;

  /// Create or rename a user in the actor directory.
  fn upsert_user(
    &self,
    user: User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
