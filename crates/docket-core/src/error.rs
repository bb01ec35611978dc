//! Error types for `docket-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("field {field:?} is not registered for {kind}")]
  UnknownField { kind: EntityKind, field: String },

  #[error("expected a {expected} snapshot, got {actual}")]
  SnapshotKindMismatch {
    expected: EntityKind,
    actual:   EntityKind,
  },

  /// A unit of work tried to file records for a different entity, action or
  /// actor under a batch id it already used.
  #[error("batch {0} already belongs to a different entity, action or actor")]
  HeterogeneousBatch(Uuid),

  #[error("unknown entity kind: {0:?}")]
  UnknownEntityKind(String),

  #[error("unknown action kind: {0:?}")]
  UnknownActionKind(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a collaborator's error into [`Error::Store`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
