//! Handler for `GET /rules`: the rule table the engine enforces.

use axum::{Json, extract::State};
use docket_core::{audit::AuditSink, rules::Rule, store::RequestStore};

use crate::Engine;

/// `GET /rules`
pub async fn list<S, A>(State(engine): State<Engine<S, A>>) -> Json<Vec<Rule>>
where
  S: RequestStore,
  A: AuditSink,
{
  Json(engine.rules().rules().to_vec())
}
