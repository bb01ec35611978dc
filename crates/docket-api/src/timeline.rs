//! Handlers for the read side of the audit log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/timeline/{reference_kind}/{reference_id}` | `?page=&page_size=` |
//! | `GET`  | `/tickets/{id}/timeline` | Reference kind fixed to tickets |
//! | `GET`  | `/batches/{batch_id}` | Every field change of one batch |

use std::str::FromStr;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use docket_core::{
  change::Reference,
  entity::EntityKind,
  timeline::{FieldChange, PagedResult, TimelineEntry},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, Backend, error::ApiError};

const DEFAULT_PAGE_SIZE: u32 = 20;

// ─── Paging ───────────────────────────────────────────────────────────────────

/// `?page=&page_size=`; both default when absent and must be at least 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<i64>,
  pub page_size: Option<i64>,
}

impl PageParams {
  pub fn resolve(&self) -> Result<(u32, u32), ApiError> {
    fn positive(name: &str, value: Option<i64>, default: u32) -> Result<u32, ApiError> {
      match value {
        None => Ok(default),
        Some(v) if v >= 1 => u32::try_from(v)
          .map_err(|_| ApiError::BadRequest(format!("{name} is out of range"))),
        Some(v) => Err(ApiError::BadRequest(format!("{name} must be at least 1, got {v}"))),
      }
    }

    Ok((
      positive("page", self.page, 1)?,
      positive("page_size", self.page_size, DEFAULT_PAGE_SIZE)?,
    ))
  }
}

// ─── Timeline ─────────────────────────────────────────────────────────────────

/// `GET /timeline/{reference_kind}/{reference_id}`
pub async fn by_reference<S: Backend>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(String, i64)>,
  Query(params): Query<PageParams>,
) -> Result<Json<PagedResult<TimelineEntry>>, ApiError> {
  let kind = EntityKind::from_str(&kind)
    .map_err(|_| ApiError::BadRequest(format!("unknown reference kind {kind:?}")))?;
  let (page, page_size) = params.resolve()?;

  let result = state
    .audit
    .get_timeline(Reference::new(kind, id), page, page_size)
    .await?;
  Ok(Json(result))
}

/// `GET /tickets/{id}/timeline`
pub async fn for_ticket<S: Backend>(
  State(state): State<AppState<S>>,
  Path(ticket_id): Path<i64>,
  Query(params): Query<PageParams>,
) -> Result<Json<PagedResult<TimelineEntry>>, ApiError> {
  let (page, page_size) = params.resolve()?;
  let result = state
    .audit
    .get_timeline_for_ticket(ticket_id, page, page_size)
    .await?;
  Ok(Json(result))
}

// ─── Batch detail ─────────────────────────────────────────────────────────────

/// `GET /batches/{batch_id}`. An unknown batch is an empty list.
pub async fn batch_detail<S: Backend>(
  State(state): State<AppState<S>>,
  Path(batch_id): Path<Uuid>,
) -> Result<Json<Vec<FieldChange>>, ApiError> {
  Ok(Json(state.audit.get_batch_detail(batch_id).await?))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(page: Option<i64>, page_size: Option<i64>) -> PageParams {
    PageParams { page, page_size }
  }

  #[test]
  fn paging_defaults() {
    assert_eq!(params(None, None).resolve().unwrap(), (1, 20));
    assert_eq!(params(Some(3), Some(5)).resolve().unwrap(), (3, 5));
  }

  #[test]
  fn paging_rejects_values_below_one() {
    assert!(matches!(params(Some(0), None).resolve(), Err(ApiError::BadRequest(_))));
    assert!(matches!(params(None, Some(-4)).resolve(), Err(ApiError::BadRequest(_))));
    assert!(matches!(
      params(Some(i64::from(u32::MAX) + 1), None).resolve(),
      Err(ApiError::BadRequest(_))
    ));
  }
}
