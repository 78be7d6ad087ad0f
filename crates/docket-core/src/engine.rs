//! [`TransitionEngine`]: the single entry point for creating and advancing
//! requests.
//!
//! A transition is checked against the [`RuleTable`] and then applied to the
//! store as one compare-and-swap. If a concurrent writer moved the request in
//! between, the loser gets [`Error::InvalidTransition`]; the engine never
//! retries on its own.

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
  Error, Result,
  audit::{AuditEvent, AuditSink},
  request::{HistoryEntry, NewRequest, Request, RequestId},
  role::{Actor, Role},
  rules::{Action, RuleTable},
  store::{ApplyOutcome, Mutation, RequestFilter, RequestStore},
};

/// Undelivered audit events kept by default before the oldest are dropped.
pub const DEFAULT_QUEUE_LIMIT: usize = 1024;

pub struct TransitionEngine<S, A> {
  store:       S,
  sink:        A,
  rules:       RuleTable,
  /// Events whose delivery failed, oldest first.
  undelivered: Mutex<Vec<AuditEvent>>,
  queue_limit: usize,
}

impl<S, A> TransitionEngine<S, A>
where
  S: RequestStore,
  A: AuditSink,
{
  /// An engine enforcing [`RuleTable::standard`].
  pub fn new(store: S, sink: A) -> Self {
    Self::with_rules(store, sink, RuleTable::standard())
  }

  pub fn with_rules(store: S, sink: A, rules: RuleTable) -> Self {
    Self {
      store,
      sink,
      rules,
      undelivered: Mutex::new(Vec::new()),
      queue_limit: DEFAULT_QUEUE_LIMIT,
    }
  }

  /// Keep at most `limit` undelivered events; older ones are dropped first.
  pub fn with_queue_limit(mut self, limit: usize) -> Self {
    self.queue_limit = limit;
    self
  }

  pub fn rules(&self) -> &RuleTable { &self.rules }

  pub fn store(&self) -> &S { &self.store }

  pub fn sink(&self) -> &A { &self.sink }

  // ── Store access ──────────────────────────────────────────────────────────

  /// Validate and persist a new request in its kind's initial status.
  pub async fn create(&self, input: NewRequest) -> Result<Request> {
    input.validate()?;
    let request = self.store.insert(input).await.map_err(Error::store)?;
    tracing::info!(
      request_id = %request.id,
      kind = %request.kind,
      submitter = %request.submitter.id,
      "request created"
    );
    Ok(request)
  }

  pub async fn get(&self, id: &RequestId) -> Result<Request> {
    self
      .store
      .get(id.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(id.clone()))
  }

  pub async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>> {
    self.store.list(filter).await.map_err(Error::store)
  }

  /// Requests on which `role` can act right now, in insertion order.
  pub async fn inbox(&self, role: Role) -> Result<Vec<Request>> {
    let mut requests = self.list(&RequestFilter::default()).await?;
    requests.retain(|r| !self.rules.actions_for(r.kind, r.status, role).is_empty());
    Ok(requests)
  }

  pub async fn available_actions(&self, id: &RequestId, role: Role) -> Result<Vec<Action>> {
    let request = self.get(id).await?;
    Ok(self.rules.actions_for(request.kind, request.status, role))
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Advance request `id` by `action` on behalf of `actor`.
  ///
  /// Fails with [`Error::NotFound`], [`Error::InvalidTransition`] when no
  /// rule leads out of the current status via `action` (including terminal
  /// statuses and lost races), or [`Error::Unauthorized`] when the rule
  /// belongs to another role. A failed call never changes the request.
  pub async fn transition(
    &self,
    id: &RequestId,
    action: Action,
    actor: &Actor,
    notes: Option<String>,
  ) -> Result<Request> {
    let request = self.get(id).await?;

    let Some(rule) = self.rules.resolve(request.kind, request.status, action) else {
      tracing::debug!(request_id = %id, status = %request.status, %action, "no rule for transition");
      return Err(Error::InvalidTransition {
        id: id.clone(),
        status: request.status,
        action,
      });
    };

    if !self.rules.is_authorized(request.kind, rule.from, action, actor.role) {
      tracing::debug!(request_id = %id, %action, role = %actor.role, "transition refused");
      return Err(Error::Unauthorized {
        role: actor.role,
        kind: request.kind,
        status: request.status,
        action,
      });
    }

    let mutation = Mutation {
      expected_status:  rule.from,
      expected_version: request.version,
      entry:            HistoryEntry {
        action:     Some(action),
        actor_role: actor.role,
        actor_name: actor.name.clone(),
        to_status:  rule.to,
        at:         Utc::now(),
        notes:      notes.clone(),
      },
      notes,
    };

    let updated = match self
      .store
      .apply_transition(id.clone(), mutation)
      .await
      .map_err(Error::store)?
    {
      ApplyOutcome::Applied(updated) => updated,
      ApplyOutcome::Stale { current } => {
        tracing::debug!(request_id = %id, %current, %action, "lost transition race");
        return Err(Error::InvalidTransition { id: id.clone(), status: current, action });
      }
      ApplyOutcome::Missing => return Err(Error::NotFound(id.clone())),
    };

    tracing::info!(
      request_id = %id,
      from = %rule.from,
      to = %rule.to,
      actor = %actor.name,
      role = %actor.role,
      "request transitioned"
    );

    self
      .deliver(AuditEvent::for_transition(&updated, rule.from, action, actor))
      .await;
    Ok(updated)
  }

  // ── Audit delivery ────────────────────────────────────────────────────────

  async fn deliver(&self, event: AuditEvent) {
    match self.sink.record(event.clone()).await {
      Ok(()) => {
        // The sink is reachable again, so flush what earlier failures left.
        let backlog = !self.undelivered.lock().await.is_empty();
        if backlog {
          self.retry_undelivered().await;
        }
      }
      Err(e) => {
        tracing::warn!(
          error = %e,
          event_id = %event.event_id,
          request_id = %event.request_id,
          "audit delivery failed; queued for retry"
        );
        let mut queue = self.undelivered.lock().await;
        queue.push(event);
        self.trim(&mut queue);
      }
    }
  }

  fn trim(&self, queue: &mut Vec<AuditEvent>) {
    if queue.len() > self.queue_limit {
      let dropped = queue.len() - self.queue_limit;
      queue.drain(..dropped);
      tracing::error!(dropped, limit = self.queue_limit, "audit queue full; oldest events dropped");
    }
  }

  /// Events that have not yet reached the sink.
  pub async fn undelivered(&self) -> Vec<AuditEvent> { self.undelivered.lock().await.clone() }

  /// Redeliver queued events. Returns how many are still undelivered.
  pub async fn retry_undelivered(&self) -> usize {
    let pending = std::mem::take(&mut *self.undelivered.lock().await);
    let mut failed = Vec::new();
    for event in pending {
      if let Err(e) = self.sink.record(event.clone()).await {
        tracing::warn!(error = %e, event_id = %event.event_id, "audit redelivery failed");
        failed.push(event);
      }
    }

    let mut queue = self.undelivered.lock().await;
    // Anything queued while we were redelivering is newer.
    failed.append(&mut queue);
    *queue = failed;
    self.trim(&mut queue);
    queue.len()
  }
}
