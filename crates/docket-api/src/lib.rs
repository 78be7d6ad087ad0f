//! JSON REST API for Docket.
//!
//! Exposes an axum [`Router`] backed by a [`TransitionEngine`] over any
//! [`RequestStore`] and [`AuditSink`]. The acting user is read from the
//! `x-actor-role` / `x-actor-name` headers set by the identity provider in
//! front of this service; TLS and authentication are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", docket_api::api_router(engine.clone()))
//! ```

pub mod actor;
pub mod error;
pub mod extract;
pub mod requests;
pub mod rules;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use docket_core::{audit::AuditSink, engine::TransitionEngine, store::RequestStore};

pub use actor::CurrentActor;
pub use error::ApiError;

/// Shared handler state.
pub type Engine<S, A> = Arc<TransitionEngine<S, A>>;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, A>(engine: Engine<S, A>) -> Router<()>
where
  S: RequestStore + 'static,
  A: AuditSink + 'static,
{
  Router::new()
    // Requests
    .route("/requests", get(requests::list::<S, A>).post(requests::create::<S, A>))
    .route("/requests/{id}", get(requests::get_one::<S, A>))
    .route("/requests/{id}/actions", get(requests::actions::<S, A>))
    .route("/requests/{id}/transitions", post(requests::transition::<S, A>))
    // Per-role work queue
    .route("/inbox", get(requests::inbox::<S, A>))
    // Rule table
    .route("/rules", get(rules::list::<S, A>))
    .with_state(engine)
}
