//! [`MemoryStore`]: an in-process [`RequestStore`].

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
  request::{NewRequest, Request, RequestId, RequestKind},
  store::{ApplyOutcome, Mutation, RequestFilter, RequestStore},
};

#[derive(Default)]
struct Inner {
  /// Insertion order.
  requests: Vec<Request>,
  index:    HashMap<RequestId, usize>,
  issued:   HashMap<RequestKind, u64>,
}

/// A request store held entirely in memory.
///
/// Cloning is cheap and clones share the same data. Every write takes the
/// lock for its whole read-modify-write, so racing transitions serialize.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }
}

impl RequestStore for MemoryStore {
  type Error = Infallible;

  async fn insert(&self, input: NewRequest) -> Result<Request, Infallible> {
    let mut inner = self.inner.write().await;

    let seq = inner.issued.entry(input.kind).or_insert(0);
    let id = RequestId::for_sequence(input.kind, *seq);
    *seq += 1;

    let request = input.into_request(id.clone(), Utc::now());
    let position = inner.requests.len();
    inner.requests.push(request.clone());
    inner.index.insert(id, position);
    Ok(request)
  }

  async fn get(&self, id: RequestId) -> Result<Option<Request>, Infallible> {
    let inner = self.inner.read().await;
    Ok(inner.index.get(&id).map(|&i| inner.requests[i].clone()))
  }

  async fn list<'a>(&'a self, filter: &'a RequestFilter) -> Result<Vec<Request>, Infallible> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .requests
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect(),
    )
  }

  async fn apply_transition(
    &self,
    id: RequestId,
    mutation: Mutation,
  ) -> Result<ApplyOutcome, Infallible> {
    let mut inner = self.inner.write().await;
    let Some(&i) = inner.index.get(&id) else {
      return Ok(ApplyOutcome::Missing);
    };
    let request = &mut inner.requests[i];

    if request.status != mutation.expected_status
      || request.version != mutation.expected_version
    {
      return Ok(ApplyOutcome::Stale { current: request.status });
    }

    request.status = mutation.entry.to_status;
    request.history.push(mutation.entry);
    request.version += 1;
    if let Some(notes) = mutation.notes {
      request.notes = Some(notes);
    }
    Ok(ApplyOutcome::Applied(request.clone()))
  }
}
