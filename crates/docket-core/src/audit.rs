//! [`AuditLog`]: the audit engine wired to its collaborators.
//!
//! Write side: [`AuditLog::emit`] queues into a caller's unit of work;
//! [`AuditLog::log_entity_changes`] and [`AuditLog::log_change`] commit on
//! their own. Read side: [`AuditLog::get_timeline`] and
//! [`AuditLog::get_batch_detail`].

use std::{
  collections::{BTreeMap, BTreeSet, HashMap, HashSet},
  sync::Arc,
};

use uuid::Uuid;

use crate::{
  Error, Result,
  change::Reference,
  emit::{self, EmitRequest, Emitted, MarkerRequest},
  entity::EntityKind,
  registry::FieldRegistry,
  store::{ActorDirectory, ChangeStore, EntityOracle},
  timeline::{Batch, FieldChange, PagedResult, TimelineEntry, TimelinePolicy},
  unit::UnitOfWork,
};

pub struct AuditLog<S, O = S, D = S> {
  store:     S,
  oracle:    O,
  directory: D,
  registry:  Arc<FieldRegistry>,
  policy:    Arc<TimelinePolicy>,
}

impl<S> AuditLog<S, S, S>
where
  S: ChangeStore + EntityOracle + ActorDirectory + Clone,
{
  /// An audit log whose store also acts as existence oracle and actor
  /// directory.
  pub fn with_store(store: S, registry: Arc<FieldRegistry>, policy: Arc<TimelinePolicy>) -> Self {
    Self::new(store.clone(), store.clone(), store, registry, policy)
  }
}

impl<S, O, D> AuditLog<S, O, D>
where
  S: ChangeStore,
  O: EntityOracle,
  D: ActorDirectory,
{
  pub fn new(
    store: S,
    oracle: O,
    directory: D,
    registry: Arc<FieldRegistry>,
    policy: Arc<TimelinePolicy>,
  ) -> Self {
    Self { store, oracle, directory, registry, policy }
  }

  // ── Write path ────────────────────────────────────────────────────────────

  /// Diff two snapshots into `unit`. Nothing is written until the unit is
  /// committed.
  pub fn emit(&self, unit: &mut UnitOfWork, req: EmitRequest<'_>) -> Result<Emitted> {
    emit::emit(&self.registry, unit, req)
  }

  pub fn emit_marker(&self, unit: &mut UnitOfWork, req: MarkerRequest<'_>) -> Result<()> {
    emit::emit_marker(unit, req)
  }

  /// Commit `unit` atomically. Empty units are not sent to the store.
  pub async fn commit(&self, unit: UnitOfWork) -> Result<Vec<i64>> {
    if unit.is_empty() {
      return Ok(Vec::new());
    }
    let records = unit.records().len();
    let ids = self.store.commit(unit).await.map_err(Error::store)?;
    tracing::debug!(records, "committed unit of work");
    Ok(ids)
  }

  /// Diff and commit in one step, for callers without a unit of work of
  /// their own.
  pub async fn log_entity_changes(&self, req: EmitRequest<'_>) -> Result<Emitted> {
    let mut unit = UnitOfWork::new();
    let emitted = self.emit(&mut unit, req)?;
    self.commit(unit).await?;
    Ok(emitted)
  }

  /// Log one ad hoc field change under a fresh batch and commit it.
  pub async fn log_change(
    &self,
    entity_kind: EntityKind,
    entity_id: i64,
    field_name: &str,
    old: Option<String>,
    new: Option<String>,
    actor_id: &str,
  ) -> Result<Uuid> {
    let mut unit = UnitOfWork::new();
    let batch_id =
      emit::emit_one(&mut unit, entity_kind, entity_id, field_name, old, new, actor_id)?;
    self.commit(unit).await?;
    Ok(batch_id)
  }

  // ── Read path ─────────────────────────────────────────────────────────────

  /// One page of timeline entries filed under `reference`, newest first.
  ///
  /// Pagination counts batches, not records. `page` and `page_size` must be
  /// at least 1.
  pub async fn get_timeline(
    &self,
    reference: Reference,
    page: u32,
    page_size: u32,
  ) -> Result<PagedResult<TimelineEntry>> {
    let total_count = self.store.count_batches(reference).await.map_err(Error::store)?;
    if total_count == 0 {
      return Ok(PagedResult::empty(page, page_size));
    }

    let offset = u64::from(page.saturating_sub(1)) * u64::from(page_size);
    let batch_ids = self
      .store
      .page_batches(reference, offset, u64::from(page_size))
      .await
      .map_err(Error::store)?;

    let records = if batch_ids.is_empty() {
      Vec::new()
    } else {
      self.store.records_for_batches(&batch_ids).await.map_err(Error::store)?
    };
    let batches = Batch::group(records, &batch_ids);

    let existing = self.existing_entities(&batches).await?;
    let names = self.actor_names(&batches).await?;

    let mut items: Vec<TimelineEntry> = batches
      .into_iter()
      .map(|batch| {
        if !batch.is_homogeneous() {
          tracing::warn!(batch_id = %batch.batch_id, "batch mixes entities, actions or actors");
        }
        let exists = existing
          .get(&batch.entity_kind)
          .is_some_and(|ids| ids.contains(&batch.entity_id));
        let name = names
          .get(&batch.actor_id)
          .cloned()
          .unwrap_or_else(|| batch.actor_id.clone());
        batch.into_entry(exists, name, &self.policy)
      })
      .collect();
    items.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));

    tracing::debug!(
      reference_kind = %reference.kind,
      reference_id = reference.id,
      page,
      total_count,
      returned = items.len(),
      "assembled timeline page"
    );

    Ok(PagedResult { total_count, page, page_size, items })
  }

  /// [`get_timeline`](Self::get_timeline) with the reference kind fixed to
  /// tickets.
  pub async fn get_timeline_for_ticket(
    &self,
    ticket_id: i64,
    page: u32,
    page_size: u32,
  ) -> Result<PagedResult<TimelineEntry>> {
    self.get_timeline(Reference::ticket(ticket_id), page, page_size).await
  }

  /// Every field change of one batch, ordered by field name.
  pub async fn get_batch_detail(&self, batch_id: Uuid) -> Result<Vec<FieldChange>> {
    let records = self.store.records_for_batch(batch_id).await.map_err(Error::store)?;
    Ok(
      records
        .iter()
        .filter_map(|r| self.policy.project(r, self.policy.detail_preview_len))
        .collect(),
    )
  }

  /// One oracle call per entity kind present among the representatives.
  async fn existing_entities(
    &self,
    batches: &[Batch],
  ) -> Result<HashMap<EntityKind, HashSet<i64>>> {
    let mut wanted: BTreeMap<EntityKind, BTreeSet<i64>> = BTreeMap::new();
    for batch in batches {
      wanted.entry(batch.entity_kind).or_default().insert(batch.entity_id);
    }

    let mut existing = HashMap::with_capacity(wanted.len());
    for (kind, ids) in wanted {
      let ids: Vec<i64> = ids.into_iter().collect();
      let found = self.oracle.existing_ids(kind, &ids).await.map_err(Error::store)?;
      existing.insert(kind, found);
    }
    Ok(existing)
  }

  /// One directory call for every distinct actor on the page.
  async fn actor_names(&self, batches: &[Batch]) -> Result<HashMap<String, String>> {
    let actors: BTreeSet<&str> = batches.iter().map(|b| b.actor_id.as_str()).collect();
    if actors.is_empty() {
      return Ok(HashMap::new());
    }
    let actors: Vec<String> = actors.into_iter().map(str::to_owned).collect();
    self.directory.display_names(&actors).await.map_err(Error::store)
  }
}
