//! [`SqliteStore`]: the SQLite implementation of the Docket collaborator
//! traits.

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use docket_core::{
  change::{ChangeRecord, Reference},
  entity::{EntityKind, EntitySnapshot, User},
  store::{ActorDirectory, ChangeStore, EntityOracle, EntityStore},
  unit::UnitOfWork,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    CHANGE_COLUMNS, EncodedChange, EncodedWrite, RawChangeRecord, RawTicket,
    attachment_from_row, comment_from_row, decode_uuid, encode_entity_kind,
    encode_uuid, entity_table,
  },
  error::Error,
  schema::SCHEMA,
};

/// Most ids bound into one `IN (...)` list. SQLite caps bound variables
/// per statement, so longer lists are split across statements.
const MAX_BINDS: usize = 500;

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Docket store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Apply one entity write inside an open transaction.
fn apply_write(tx: &rusqlite::Transaction<'_>, write: &EncodedWrite) -> rusqlite::Result<()> {
  match write {
    EncodedWrite::Ticket {
      ticket_id,
      title,
      description,
      status,
      priority,
      responsible_name,
      location,
      due_date,
    } => {
      tx.execute(
        "INSERT INTO tickets (
           ticket_id, title, description, status, priority,
           responsible_name, location, due_date
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(ticket_id) DO UPDATE SET
           title            = excluded.title,
           description      = excluded.description,
           status           = excluded.status,
           priority         = excluded.priority,
           responsible_name = excluded.responsible_name,
           location         = excluded.location,
           due_date         = excluded.due_date",
        rusqlite::params![
          ticket_id,
          title,
          description,
          status,
          priority,
          responsible_name,
          location,
          due_date,
        ],
      )?;
    }
    EncodedWrite::Comment(c) => {
      tx.execute(
        "INSERT INTO comments (comment_id, ticket_id, text) VALUES (?1, ?2, ?3)
         ON CONFLICT(comment_id) DO UPDATE SET
           ticket_id = excluded.ticket_id,
           text      = excluded.text",
        rusqlite::params![c.comment_id, c.ticket_id, c.text],
      )?;
    }
    EncodedWrite::Attachment(a) => {
      tx.execute(
        "INSERT INTO attachments (attachment_id, ticket_id, file_name, content_type, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(attachment_id) DO UPDATE SET
           ticket_id    = excluded.ticket_id,
           file_name    = excluded.file_name,
           content_type = excluded.content_type,
           size_bytes   = excluded.size_bytes",
        rusqlite::params![
          a.attachment_id,
          a.ticket_id,
          a.file_name,
          a.content_type,
          a.size_bytes
        ],
      )?;
    }
    EncodedWrite::Delete { table, id_column, id } => {
      tx.execute(
        &format!("DELETE FROM {table} WHERE {id_column} = ?1"),
        rusqlite::params![id],
      )?;
    }
  }
  Ok(())
}

/// Append one change record inside an open transaction and return its id.
fn insert_change(tx: &rusqlite::Transaction<'_>, c: &EncodedChange) -> rusqlite::Result<i64> {
  tx.execute(
    "INSERT INTO change_records (
       entity_kind, entity_id, change_kind, field_name, old_value, new_value,
       message, changed_at, actor_id, batch_id, action_kind,
       reference_kind, reference_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    rusqlite::params![
      c.entity_kind,
      c.entity_id,
      c.change_kind,
      c.field_name,
      c.old_value,
      c.new_value,
      c.message,
      c.changed_at,
      c.actor_id,
      c.batch_id,
      c.action_kind,
      c.reference_kind,
      c.reference_id,
    ],
  )?;
  Ok(tx.last_insert_rowid())
}

// ─── ChangeStore impl ────────────────────────────────────────────────────────

impl ChangeStore for SqliteStore {
  type Error = Error;

  async fn commit(&self, unit: UnitOfWork) -> Result<Vec<i64>> {
    let (writes, records) = unit.into_parts();
    let writes: Vec<EncodedWrite> = writes.into_iter().map(EncodedWrite::from).collect();
    let changes: Vec<EncodedChange> = records.into_iter().map(EncodedChange::from).collect();

    let ids = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for write in &writes {
          apply_write(&tx, write)?;
        }
        let ids = changes
          .iter()
          .map(|c| insert_change(&tx, c))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
      })
      .await?;

    tracing::debug!(records = ids.len(), "appended change records");
    Ok(ids)
  }

  async fn count_batches(&self, reference: Reference) -> Result<u64> {
    let kind = encode_entity_kind(reference.kind);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(DISTINCT batch_id) FROM change_records
           WHERE reference_kind = ?1 AND reference_id = ?2",
          rusqlite::params![kind, reference.id],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn page_batches(
    &self,
    reference: Reference,
    offset: u64,
    limit: u64,
  ) -> Result<Vec<Uuid>> {
    let kind = encode_entity_kind(reference.kind);
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(offset).unwrap_or(i64::MAX);

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT batch_id
           FROM change_records
           WHERE reference_kind = ?1 AND reference_id = ?2
           GROUP BY batch_id
           ORDER BY MAX(changed_at) DESC, MAX(id) DESC
           LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![kind, reference.id, limit_val, offset_val],
            |row| row.get(0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(String::as_str).map(decode_uuid).collect()
  }

  async fn records_for_batches<'a>(&'a self, batch_ids: &'a [Uuid]) -> Result<Vec<ChangeRecord>> {
    if batch_ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<String> = batch_ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawChangeRecord> = self
      .conn
      .call(move |conn| {
        let mut rows = Vec::new();
        for chunk in ids.chunks(MAX_BINDS) {
          let sql = format!(
            "SELECT {CHANGE_COLUMNS} FROM change_records
             WHERE batch_id IN ({})",
            placeholders(chunk.len())
          );
          let mut stmt = conn.prepare(&sql)?;
          for row in
            stmt.query_map(rusqlite::params_from_iter(chunk.iter()), RawChangeRecord::from_row)?
          {
            rows.push(row?);
          }
        }
        // Timestamps are fixed-width, so text order is time order.
        rows.sort_by(|a, b| (a.changed_at.as_str(), a.id).cmp(&(b.changed_at.as_str(), b.id)));
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChangeRecord::into_record).collect()
  }

  async fn records_for_batch(&self, batch_id: Uuid) -> Result<Vec<ChangeRecord>> {
    let id = encode_uuid(batch_id);

    let raws: Vec<RawChangeRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {CHANGE_COLUMNS} FROM change_records
           WHERE batch_id = ?1
           ORDER BY field_name, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawChangeRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChangeRecord::into_record).collect()
  }
}

// ─── EntityOracle impl ───────────────────────────────────────────────────────

impl EntityOracle for SqliteStore {
  type Error = Error;

  async fn existing_ids<'a>(&'a self, kind: EntityKind, ids: &'a [i64]) -> Result<HashSet<i64>> {
    if ids.is_empty() {
      return Ok(HashSet::new());
    }
    let (table, id_column) = entity_table(kind);
    let ids = ids.to_vec();

    let found: HashSet<i64> = self
      .conn
      .call(move |conn| {
        let mut found = HashSet::new();
        for chunk in ids.chunks(MAX_BINDS) {
          let sql = format!(
            "SELECT {id_column} FROM {table} WHERE {id_column} IN ({})",
            placeholders(chunk.len())
          );
          let mut stmt = conn.prepare(&sql)?;
          for id in stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| row.get(0))? {
            found.insert(id?);
          }
        }
        Ok(found)
      })
      .await?;

    Ok(found)
  }
}

// ─── ActorDirectory impl ─────────────────────────────────────────────────────

impl ActorDirectory for SqliteStore {
  type Error = Error;

  async fn display_names<'a>(&'a self, actor_ids: &'a [String]) -> Result<HashMap<String, String>> {
    if actor_ids.is_empty() {
      return Ok(HashMap::new());
    }
    let ids = actor_ids.to_vec();

    let names: HashMap<String, String> = self
      .conn
      .call(move |conn| {
        let mut names = HashMap::new();
        for chunk in ids.chunks(MAX_BINDS) {
          let sql = format!(
            "SELECT user_id, display_name FROM users WHERE user_id IN ({})",
            placeholders(chunk.len())
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
          })?;
          for row in rows {
            let (user_id, display_name) = row?;
            names.insert(user_id, display_name);
          }
        }
        Ok(names)
      })
      .await?;

    Ok(names)
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  async fn next_id(&self, kind: EntityKind) -> Result<i64> {
    let kind_str = encode_entity_kind(kind);
    let (table, id_column) = entity_table(kind);

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let max_existing: i64 = tx.query_row(
          &format!("SELECT COALESCE(MAX({id_column}), 0) FROM {table}"),
          [],
          |row| row.get(0),
        )?;
        let last: Option<i64> = tx
          .query_row(
            "SELECT last_id FROM id_sequences WHERE entity_kind = ?1",
            rusqlite::params![kind_str],
            |row| row.get(0),
          )
          .optional()?;
        let next = last.unwrap_or(0).max(max_existing) + 1;
        tx.execute(
          "INSERT INTO id_sequences (entity_kind, last_id) VALUES (?1, ?2)
           ON CONFLICT(entity_kind) DO UPDATE SET last_id = excluded.last_id",
          rusqlite::params![kind_str, next],
        )?;
        tx.commit()?;
        Ok(next)
      })
      .await?;

    Ok(id)
  }

  async fn get_entity(&self, kind: EntityKind, id: i64) -> Result<Option<EntitySnapshot>> {
    match kind {
      EntityKind::Ticket => {
        let raw: Option<RawTicket> = self
          .conn
          .call(move |conn| {
            Ok(conn
              .query_row(
                "SELECT ticket_id, title, description, status, priority,
                        responsible_name, location, due_date
                 FROM tickets WHERE ticket_id = ?1",
                rusqlite::params![id],
                |row| {
                  Ok(RawTicket {
                    ticket_id:        row.get(0)?,
                    title:            row.get(1)?,
                    description:      row.get(2)?,
                    status:           row.get(3)?,
                    priority:         row.get(4)?,
                    responsible_name: row.get(5)?,
                    location:         row.get(6)?,
                    due_date:         row.get(7)?,
                  })
                },
              )
              .optional()?)
          })
          .await?;
        raw.map(RawTicket::into_snapshot).transpose()
      }
      EntityKind::Comment => Ok(
        self
          .conn
          .call(move |conn| {
            Ok(conn
              .query_row(
                "SELECT comment_id, ticket_id, text FROM comments WHERE comment_id = ?1",
                rusqlite::params![id],
                comment_from_row,
              )
              .optional()?)
          })
          .await?,
      ),
      EntityKind::Attachment => Ok(
        self
          .conn
          .call(move |conn| {
            Ok(conn
              .query_row(
                "SELECT attachment_id, ticket_id, file_name, content_type, size_bytes
                 FROM attachments WHERE attachment_id = ?1",
                rusqlite::params![id],
                attachment_from_row,
              )
              .optional()?)
          })
          .await?,
      ),
    }
  }

  async fn upsert_user(&self, user: User) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, display_name) VALUES (?1, ?2)
           ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name",
          rusqlite::params![user.user_id, user.display_name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
