//! Handlers for `/requests` and `/inbox`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/requests` | Optional `?status`, `?kind`, `?submitter_id` |
//! | `POST` | `/requests` | Body: [`CreateBody`]; returns 201 + stored request |
//! | `GET`  | `/requests/:id` | 404 if not found |
//! | `GET`  | `/requests/:id/actions` | Actions open to the calling role |
//! | `POST` | `/requests/:id/transitions` | Body: [`TransitionBody`]; returns the updated request |
//! | `GET`  | `/inbox` | Requests the calling role can act on |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use docket_core::{
  audit::AuditSink,
  payload::Payload,
  request::{NewRequest, Request, RequestId, RequestKind, RequestStatus, Submitter},
  rules::Action,
  store::{RequestFilter, RequestStore},
};
use serde::Deserialize;

use crate::{
  CurrentActor, Engine,
  error::ApiError,
  extract::{JsonBody, QueryParams},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:       Option<RequestStatus>,
  pub kind:         Option<RequestKind>,
  pub submitter_id: Option<String>,
}

/// `GET /requests[?status=...][&kind=...][&submitter_id=...]`
pub async fn list<S, A>(
  State(engine): State<Engine<S, A>>,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Request>>, ApiError>
where
  S: RequestStore,
  A: AuditSink,
{
  let filter = RequestFilter {
    status:       params.status,
    kind:         params.kind,
    submitter_id: params.submitter_id,
  };
  Ok(Json(engine.list(&filter).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /requests`. The submitter's name and role come
/// from the actor headers.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kind:         RequestKind,
  /// Defaults to the actor name when the identity provider has no separate
  /// user id.
  pub submitter_id: Option<String>,
  pub payload:      Payload,
  pub notes:        Option<String>,
}

/// `POST /requests`: returns 201 + the stored [`Request`].
pub async fn create<S, A>(
  State(engine): State<Engine<S, A>>,
  CurrentActor(actor): CurrentActor,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RequestStore,
  A: AuditSink,
{
  let submitter = Submitter {
    id:   body.submitter_id.unwrap_or_else(|| actor.name.clone()),
    name: actor.name,
    role: actor.role,
  };
  let input = NewRequest {
    kind: body.kind,
    submitter,
    payload: body.payload,
    notes: body.notes,
  };
  let request = engine.create(input).await?;
  Ok((StatusCode::CREATED, Json(request)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /requests/:id`
pub async fn get_one<S, A>(
  State(engine): State<Engine<S, A>>,
  Path(id): Path<String>,
) -> Result<Json<Request>, ApiError>
where
  S: RequestStore,
  A: AuditSink,
{
  Ok(Json(engine.get(&RequestId::new(id)).await?))
}

// ─── Actions ──────────────────────────────────────────────────────────────────

/// `GET /requests/:id/actions`: what the calling role may do next.
pub async fn actions<S, A>(
  State(engine): State<Engine<S, A>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<String>,
) -> Result<Json<Vec<Action>>, ApiError>
where
  S: RequestStore,
  A: AuditSink,
{
  Ok(Json(engine.available_actions(&RequestId::new(id), actor.role).await?))
}

// ─── Transition ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub action: Action,
  pub notes:  Option<String>,
}

/// `POST /requests/:id/transitions`: body: `{"action":"approve","notes":"..."}`.
///
/// Returns the authoritative updated request.
pub async fn transition<S, A>(
  State(engine): State<Engine<S, A>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<TransitionBody>,
) -> Result<Json<Request>, ApiError>
where
  S: RequestStore,
  A: AuditSink,
{
  let request = engine
    .transition(&RequestId::new(id), body.action, &actor, body.notes)
    .await?;
  Ok(Json(request))
}

// ─── Inbox ────────────────────────────────────────────────────────────────────

/// `GET /inbox`
pub async fn inbox<S, A>(
  State(engine): State<Engine<S, A>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Request>>, ApiError>
where
  S: RequestStore,
  A: AuditSink,
{
  Ok(Json(engine.inbox(actor.role).await?))
}
