//! Request: the unit of work advanced through approval stages.
//!
//! A request is created once and then mutated only by the transition engine.
//! Its history is append-only and requests are never deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, payload::Payload, role::Role, rules::Action};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Store-assigned identifier, e.g. `SR-100`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// Build the id of the `seq`-th request (zero-based) of `kind`.
  pub fn for_sequence(kind: RequestKind, seq: u64) -> Self {
    Self(format!("{}-{}", kind.id_prefix(), 100 + seq))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for RequestId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for RequestId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The request category. Each kind has its own rule set.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RequestKind {
  SafetyEquipment,
  Purchase,
  Fuel,
  Material,
}

impl RequestKind {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::Unrecognised {
      field: "kind",
      value: s.to_owned(),
    })
  }

  pub fn as_str(self) -> &'static str { self.into() }

  /// Prefix used when the store assigns a [`RequestId`].
  pub fn id_prefix(self) -> &'static str {
    match self {
      Self::SafetyEquipment => "SR",
      Self::Purchase => "PR",
      Self::Fuel => "FR",
      Self::Material => "MR",
    }
  }

  /// Human-readable label used in notifications.
  pub fn label(self) -> &'static str {
    match self {
      Self::SafetyEquipment => "Safety equipment request",
      Self::Purchase => "Purchase request",
      Self::Fuel => "Fuel request",
      Self::Material => "Material request",
    }
  }

  /// Every kind starts out pending.
  pub fn initial_status(self) -> RequestStatus { RequestStatus::Pending }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Workflow status. Which statuses a kind may hold is declared by the rule
/// table.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
  Pending,
  Acknowledged,
  Approved,
  Issued,
  Closed,
  Completed,
  Rejected,
}

impl RequestStatus {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::Unrecognised {
      field: "status",
      value: s.to_owned(),
    })
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// One append-only record of a status change. The creation entry has no
/// action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub action:     Option<Action>,
  pub actor_role: Role,
  pub actor_name: String,
  pub to_status:  RequestStatus,
  pub at:         DateTime<Utc>,
  pub notes:      Option<String>,
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// Identity of whoever created a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
  pub id:   String,
  pub name: String,
  pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
  pub id:         RequestId,
  pub kind:       RequestKind,
  pub submitter:  Submitter,
  pub payload:    Payload,
  pub status:     RequestStatus,
  /// Never empty; the first entry records creation.
  pub history:    Vec<HistoryEntry>,
  /// Last writer wins.
  pub notes:      Option<String>,
  /// Optimistic concurrency token. Always equal to `history.len()`.
  pub version:    u64,
  pub created_at: DateTime<Utc>,
}

// ─── NewRequest ──────────────────────────────────────────────────────────────

/// Input to [`crate::engine::TransitionEngine::create`].
/// The id, status and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
  pub kind:      RequestKind,
  pub submitter: Submitter,
  pub payload:   Payload,
  #[serde(default)]
  pub notes:     Option<String>,
}

impl NewRequest {
  pub fn new(kind: RequestKind, submitter: Submitter, payload: Payload) -> Self {
    Self { kind, submitter, payload, notes: None }
  }

  /// Check that the submitter is identified and the payload carries every
  /// field its kind requires.
  pub fn validate(&self) -> Result<()> {
    if self.submitter.id.trim().is_empty() {
      return Err(Error::validation("submitter.id", "must not be blank"));
    }
    if self.submitter.name.trim().is_empty() {
      return Err(Error::validation("submitter.name", "must not be blank"));
    }
    if self.payload.kind() != self.kind {
      return Err(Error::validation(
        "payload",
        format!("expected a {} payload, got {}", self.kind, self.payload.kind()),
      ));
    }
    self.payload.validate()
  }

  /// The history entry recording creation.
  pub fn creation_entry(&self, at: DateTime<Utc>) -> HistoryEntry {
    HistoryEntry {
      action: None,
      actor_role: self.submitter.role,
      actor_name: self.submitter.name.clone(),
      to_status: self.kind.initial_status(),
      at,
      notes: self.notes.clone(),
    }
  }

  /// Materialise the stored request once the store has assigned an id.
  pub fn into_request(self, id: RequestId, created_at: DateTime<Utc>) -> Request {
    let entry = self.creation_entry(created_at);
    Request {
      id,
      kind: self.kind,
      status: self.kind.initial_status(),
      submitter: self.submitter,
      payload: self.payload,
      history: vec![entry],
      notes: self.notes,
      version: 1,
      created_at,
    }
  }
}
