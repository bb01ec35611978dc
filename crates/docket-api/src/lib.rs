//! JSON REST API for Docket.
//!
//! Exposes an axum [`Router`] over the audit timeline, plus the thin ticket,
//! comment and user endpoints whose writes feed it. Authentication, TLS and
//! transport concerns are the caller's responsibility; the acting user is
//! read from the `x-actor-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", docket_api::api_router(state))
//! ```

pub mod actor;
pub mod comments;
pub mod error;
pub mod tickets;
pub mod timeline;
pub mod users;
pub mod write;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use docket_core::{
  audit::AuditLog,
  registry::FieldRegistry,
  store::{ActorDirectory, ChangeStore, EntityOracle, EntityStore},
  timeline::TimelinePolicy,
};

pub use error::ApiError;

/// Everything a storage backend must provide to serve the API.
pub trait Backend:
  ChangeStore + EntityOracle + ActorDirectory + EntityStore + Clone + 'static
{
}

impl<T> Backend for T where
  T: ChangeStore + EntityOracle + ActorDirectory + EntityStore + Clone + 'static
{
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub audit: Arc<AuditLog<S>>,
  pub store: S,
}

impl<S: Backend> AppState<S> {
  pub fn new(store: S, registry: Arc<FieldRegistry>, policy: Arc<TimelinePolicy>) -> Self {
    Self {
      audit: Arc::new(AuditLog::with_store(store.clone(), registry, policy)),
      store,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Backend>(state: AppState<S>) -> Router<()> {
  Router::new()
    // Timeline
    .route(
      "/timeline/{reference_kind}/{reference_id}",
      get(timeline::by_reference::<S>),
    )
    .route("/tickets/{id}/timeline", get(timeline::for_ticket::<S>))
    .route("/batches/{batch_id}", get(timeline::batch_detail::<S>))
    // Tickets
    .route("/tickets", post(tickets::create::<S>))
    .route("/tickets/{id}", put(tickets::update::<S>).delete(tickets::delete::<S>))
    // Comments
    .route("/tickets/{id}/comments", post(comments::create::<S>))
    .route("/comments/{id}", put(comments::update::<S>).delete(comments::delete::<S>))
    // Actors
    .route("/users/{id}", put(users::upsert::<S>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use docket_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(AppState::new(
      store,
      Arc::new(FieldRegistry::standard()),
      Arc::new(TimelinePolicy::default()),
    ))
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
      builder = builder.header(actor::ACTOR_HEADER, actor);
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };

    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
  }

  fn field_names(entry: &Value) -> Vec<&str> {
    entry["changes"]
      .as_array()
      .unwrap()
      .iter()
      .map(|c| c["fieldName"].as_str().unwrap())
      .collect()
  }

  // ── Timeline ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_update_appears_newest_first() {
    let app = app().await;
    let (status, _) = send(
      &app,
      "PUT",
      "/users/alice",
      None,
      Some(json!({ "displayName": "Alice Adams" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, ticket) = send(
      &app,
      "POST",
      "/tickets",
      Some("alice"),
      Some(json!({ "title": "Pump leak", "priority": "High" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = ticket["ticketId"].as_i64().unwrap();
    assert_eq!(ticket["status"], "Open");

    let (status, _) = send(
      &app,
      "PUT",
      &format!("/tickets/{id}"),
      Some("alice"),
      Some(json!({ "title": "Pump leak", "status": "InProgress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = send(&app, "GET", &format!("/tickets/{id}/timeline"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 2);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 20);

    let items = page["items"].as_array().unwrap();
    assert_eq!(items[0]["actionKind"], "Update");
    assert_eq!(items[0]["changedByUser"], "Alice Adams");
    assert_eq!(items[0]["changedByUserId"], "alice");
    assert_eq!(items[0]["entityExists"], true);
    assert_eq!(
      items[0]["changes"],
      json!([{
        "fieldName": "Status",
        "oldValue": "Open",
        "newValue": "InProgress",
        "isImportant": true,
      }])
    );

    assert_eq!(items[1]["actionKind"], "Create");
    assert_eq!(field_names(&items[1]), vec!["Title", "Status", "Priority"]);
    assert!(items[1].get("markers").is_none());
  }

  #[tokio::test]
  async fn paging_parameters_are_validated() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/tickets/1/timeline?page=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("page"));

    let (status, _) = send(&app, "GET", "/tickets/1/timeline?page_size=-3", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) =
      send(&app, "GET", "/tickets/1/timeline?page=2&page_size=5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, json!({ "totalCount": 0, "page": 2, "pageSize": 5, "items": [] }));
  }

  #[tokio::test]
  async fn reference_kind_is_parsed_case_insensitively() {
    let app = app().await;
    send(&app, "POST", "/tickets", Some("bob"), Some(json!({ "title": "Gas smell" }))).await;

    let (status, page) = send(&app, "GET", "/timeline/ticket/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 1);
    // Unknown actors are shown by id.
    assert_eq!(page["items"][0]["changedByUser"], "bob");

    let (status, _) = send(&app, "GET", "/timeline/widget/1", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn deleted_ticket_keeps_its_history() {
    let app = app().await;
    send(&app, "POST", "/tickets", Some("alice"), Some(json!({ "title": "Broken gate" }))).await;

    let (status, _) = send(&app, "DELETE", "/tickets/1", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, page) = send(&app, "GET", "/tickets/1/timeline", None, None).await;
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|e| e["entityExists"] == false));
    assert_eq!(items[0]["actionKind"], "Delete");
    assert_eq!(items[0]["markers"], json!(["Ticket deleted"]));
    assert_eq!(items[0]["changes"][0]["oldValue"], "Broken gate");

    let (status, _) = send(&app, "DELETE", "/tickets/1", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn comment_changes_are_filed_under_the_ticket() {
    let app = app().await;
    send(&app, "POST", "/tickets", Some("alice"), Some(json!({ "title": "Leak" }))).await;

    let (status, comment) = send(
      &app,
      "POST",
      "/tickets/1/comments",
      Some("bob"),
      Some(json!({ "text": "On my way" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["commentId"].as_i64().unwrap();

    let (status, _) = send(
      &app,
      "PUT",
      &format!("/comments/{comment_id}"),
      Some("bob"),
      Some(json!({ "text": "Arrived" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, page) = send(&app, "GET", "/timeline/Ticket/1", None, None).await;
    assert_eq!(page["totalCount"], 3);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items[0]["entityKind"], "Comment");
    assert_eq!(items[0]["entityId"], comment_id);
    assert_eq!(field_names(&items[0]), vec!["Text"]);
    assert_eq!(items[1]["entityKind"], "Comment");
    assert_eq!(items[2]["entityKind"], "Ticket");

    let batch_id = items[1]["batchId"].as_str().unwrap();
    let (status, detail) = send(&app, "GET", &format!("/batches/{batch_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = detail
      .as_array()
      .unwrap()
      .iter()
      .map(|c| c["fieldName"].as_str().unwrap())
      .collect();
    assert_eq!(names, vec!["Text", "TicketId"]);

    let (status, _) = send(&app, "DELETE", &format!("/comments/{comment_id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, page) = send(&app, "GET", "/tickets/1/timeline?page_size=1", None, None).await;
    assert_eq!(page["totalCount"], 4);
    assert_eq!(page["items"][0]["markers"], json!(["Comment deleted"]));
    assert_eq!(page["items"][0]["entityExists"], false);
  }

  #[tokio::test]
  async fn unknown_batch_is_an_empty_list() {
    let app = app().await;
    let uri = format!("/batches/{}", uuid::Uuid::new_v4());
    let (status, detail) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail, json!([]));
  }

  // ── Writes ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn writes_require_an_actor() {
    let app = app().await;
    let (status, body) =
      send(&app, "POST", "/tickets", None, Some(json!({ "title": "Anonymous" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-actor-id"));

    let (_, page) = send(&app, "GET", "/tickets/1/timeline", None, None).await;
    assert_eq!(page["totalCount"], 0);
  }

  #[tokio::test]
  async fn writes_against_missing_entities_return_404() {
    let app = app().await;
    let body = json!({ "title": "Ghost" });
    let (status, _) = send(&app, "PUT", "/tickets/99", Some("alice"), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let text = json!({ "text": "hello" });
    let (status, _) =
      send(&app, "POST", "/tickets/99/comments", Some("alice"), Some(text.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PUT", "/comments/5", Some("alice"), Some(text)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn blank_title_is_rejected() {
    let app = app().await;
    let (status, _) =
      send(&app, "POST", "/tickets", Some("alice"), Some(json!({ "title": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}
