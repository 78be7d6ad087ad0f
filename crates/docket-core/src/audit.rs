//! Audit events and notification sinks.
//!
//! The engine hands every successful transition to an [`AuditSink`]. Delivery
//! is best-effort: a failing sink never undoes the status change.

use std::{convert::Infallible, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  request::{Request, RequestId, RequestKind, RequestStatus},
  role::Actor,
  rules::Action,
};

// ─── Event ───────────────────────────────────────────────────────────────────

/// A record of one successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
  /// Stable across redeliveries so sinks can deduplicate.
  pub event_id:   Uuid,
  pub request_id: RequestId,
  pub kind:       RequestKind,
  pub action:     Action,
  pub from:       RequestStatus,
  pub to:         RequestStatus,
  pub actor:      Actor,
  pub at:         DateTime<Utc>,
}

impl AuditEvent {
  /// Describe the transition that produced `request` (already updated).
  pub fn for_transition(
    request: &Request,
    from: RequestStatus,
    action: Action,
    actor: &Actor,
  ) -> Self {
    let at = request.history.last().map_or_else(Utc::now, |e| e.at);
    Self {
      event_id: Uuid::new_v4(),
      request_id: request.id.clone(),
      kind: request.kind,
      action,
      from,
      to: request.status,
      actor: actor.clone(),
      at,
    }
  }

  /// e.g. "Safety equipment request SR-100 has been acknowledged by Morgan".
  pub fn message(&self) -> String {
    format!(
      "{} {} has been {} by {}",
      self.kind.label(),
      self.request_id,
      self.action.past_tense(),
      self.actor.name
    )
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Receives one [`AuditEvent`] per successful transition.
pub trait AuditSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Deliver `event`. May be called again with the same event after a
  /// failure.
  fn record(
    &self,
    event: AuditEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Sinks ───────────────────────────────────────────────────────────────────

/// Writes each event as a structured `tracing` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
  type Error = Infallible;

  async fn record(&self, event: AuditEvent) -> Result<(), Infallible> {
    tracing::info!(
      target: "docket::audit",
      event_id = %event.event_id,
      request_id = %event.request_id,
      kind = %event.kind,
      from = %event.from,
      to = %event.to,
      actor_role = %event.actor.role,
      "{}",
      event.message()
    );
    Ok(())
  }
}

/// Keeps every delivered event in memory, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
  events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemorySink {
  pub fn new() -> Self { Self::default() }

  pub async fn events(&self) -> Vec<AuditEvent> { self.events.lock().await.clone() }
}

impl AuditSink for MemorySink {
  type Error = Infallible;

  async fn record(&self, event: AuditEvent) -> Result<(), Infallible> {
    let mut events = self.events.lock().await;
    if !events.iter().any(|e| e.event_id == event.event_id) {
      events.push(event);
    }
    Ok(())
  }
}
