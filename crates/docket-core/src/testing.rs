//! In-memory collaborators for engine tests.

use std::{
  collections::{HashMap, HashSet},
  convert::Infallible,
  sync::{Arc, Mutex, MutexGuard},
};

use uuid::Uuid;

use crate::{
  change::{ChangeRecord, Reference},
  entity::{EntityKind, EntitySnapshot},
  store::{ActorDirectory, ChangeStore, EntityOracle},
  unit::{EntityWrite, UnitOfWork},
};

#[derive(Default)]
struct Inner {
  records:      Vec<ChangeRecord>,
  entities:     HashMap<(EntityKind, i64), EntitySnapshot>,
  users:        HashMap<String, String>,
  oracle_calls: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn add_user(&self, id: &str, name: &str) {
    self.lock().users.insert(id.to_owned(), name.to_owned());
  }

  pub fn records(&self) -> Vec<ChangeRecord> { self.lock().records.clone() }

  pub fn oracle_calls(&self) -> usize { self.lock().oracle_calls }
}

impl ChangeStore for MemoryStore {
  type Error = Infallible;

  async fn commit(&self, unit: UnitOfWork) -> Result<Vec<i64>, Infallible> {
    let mut inner = self.lock();
    let (writes, records) = unit.into_parts();
    for write in writes {
      match write {
        EntityWrite::Put(snapshot) => {
          inner.entities.insert((snapshot.kind(), snapshot.id()), snapshot);
        }
        EntityWrite::Delete { kind, id } => {
          inner.entities.remove(&(kind, id));
        }
      }
    }

    let mut ids = Vec::with_capacity(records.len());
    for record in records {
      let id = inner.records.len() as i64 + 1;
      inner.records.push(ChangeRecord::from_new(id, record));
      ids.push(id);
    }
    Ok(ids)
  }

  async fn count_batches(&self, reference: Reference) -> Result<u64, Infallible> {
    let inner = self.lock();
    let batches: HashSet<Uuid> = inner
      .records
      .iter()
      .filter(|r| r.reference == reference)
      .map(|r| r.batch_id)
      .collect();
    Ok(batches.len() as u64)
  }

  async fn page_batches(
    &self,
    reference: Reference,
    offset: u64,
    limit: u64,
  ) -> Result<Vec<Uuid>, Infallible> {
    let inner = self.lock();
    let mut latest: HashMap<Uuid, (chrono::DateTime<chrono::Utc>, i64)> = HashMap::new();
    for r in inner.records.iter().filter(|r| r.reference == reference) {
      let entry = latest.entry(r.batch_id).or_insert((r.changed_at, r.id));
      *entry = (*entry).max((r.changed_at, r.id));
    }

    let mut batches: Vec<_> = latest.into_iter().collect();
    batches.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(
      batches
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(|(batch_id, _)| batch_id)
        .collect(),
    )
  }

  async fn records_for_batches<'a>(
    &'a self,
    batch_ids: &'a [Uuid],
  ) -> Result<Vec<ChangeRecord>, Infallible> {
    let inner = self.lock();
    Ok(
      inner
        .records
        .iter()
        .filter(|r| batch_ids.contains(&r.batch_id))
        .cloned()
        .collect(),
    )
  }

  async fn records_for_batch(&self, batch_id: Uuid) -> Result<Vec<ChangeRecord>, Infallible> {
    let inner = self.lock();
    let mut records: Vec<ChangeRecord> = inner
      .records
      .iter()
      .filter(|r| r.batch_id == batch_id)
      .cloned()
      .collect();
    records.sort_by(|a, b| {
      (a.change.field_name(), a.id).cmp(&(b.change.field_name(), b.id))
    });
    Ok(records)
  }
}

impl EntityOracle for MemoryStore {
  type Error = Infallible;

  async fn existing_ids<'a>(
    &'a self,
    kind: EntityKind,
    ids: &'a [i64],
  ) -> Result<HashSet<i64>, Infallible> {
    let mut inner = self.lock();
    inner.oracle_calls += 1;
    Ok(
      ids
        .iter()
        .copied()
        .filter(|id| inner.entities.contains_key(&(kind, *id)))
        .collect(),
    )
  }
}

impl ActorDirectory for MemoryStore {
  type Error = Infallible;

  async fn display_names<'a>(
    &'a self,
    actor_ids: &'a [String],
  ) -> Result<HashMap<String, String>, Infallible> {
    let inner = self.lock();
    Ok(
      actor_ids
        .iter()
        .filter_map(|id| inner.users.get(id).map(|name| (id.clone(), name.clone())))
        .collect(),
    )
  }
}
