//! The `RequestStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends ([`crate::memory::MemoryStore`],
//! `docket-store-sqlite`). Callers go through
//! [`crate::engine::TransitionEngine`]; `apply_transition` in particular is
//! only ever invoked by the engine after it has checked the rule table.

use std::future::Future;

use crate::request::{
  HistoryEntry, NewRequest, Request, RequestId, RequestKind, RequestStatus,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RequestStore::list`]. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
  pub status:       Option<RequestStatus>,
  pub kind:         Option<RequestKind>,
  pub submitter_id: Option<String>,
}

impl RequestFilter {
  pub fn matches(&self, request: &Request) -> bool {
    self.status.is_none_or(|s| request.status == s)
      && self.kind.is_none_or(|k| request.kind == k)
      && self
        .submitter_id
        .as_deref()
        .is_none_or(|id| request.submitter.id == id)
  }
}

// ─── Mutation ────────────────────────────────────────────────────────────────

/// A compare-and-swap status change.
///
/// Applied only if the stored request still has `expected_status` and
/// `expected_version`. The new status is `entry.to_status`.
#[derive(Debug, Clone)]
pub struct Mutation {
  pub expected_status:  RequestStatus,
  pub expected_version: u64,
  pub entry:            HistoryEntry,
  /// Replaces the request's notes when set.
  pub notes:            Option<String>,
}

/// Result of [`RequestStore::apply_transition`].
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
  Applied(Request),
  /// Another writer got there first.
  Stale { current: RequestStatus },
  Missing,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Docket request store backend.
///
/// Requests are never deleted and history is never rewritten. All methods
/// return `Send` futures so the trait can be used in multi-threaded async
/// runtimes (e.g. tokio with `axum`).
pub trait RequestStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a validated request in its initial status with a single
  /// creation history entry. The id and `created_at` are assigned by the
  /// store.
  fn insert(
    &self,
    input: NewRequest,
  ) -> impl Future<Output = Result<Request, Self::Error>> + Send + '_;

  /// Retrieve a request by id. Returns `None` if not found.
  fn get(
    &self,
    id: RequestId,
  ) -> impl Future<Output = Result<Option<Request>, Self::Error>> + Send + '_;

  /// All requests matching `filter`, in insertion order.
  fn list<'a>(
    &'a self,
    filter: &'a RequestFilter,
  ) -> impl Future<Output = Result<Vec<Request>, Self::Error>> + Send + 'a;

  /// Atomically apply `mutation` to request `id`: set the status, append the
  /// history entry, bump the version and overwrite notes if given.
  fn apply_transition(
    &self,
    id: RequestId,
    mutation: Mutation,
  ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send + '_;
}
