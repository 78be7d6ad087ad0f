//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, enums use their serde names, payloads are
//! tagged JSON and UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use docket_core::{
  audit::AuditEvent,
  payload::Payload,
  request::{HistoryEntry, Request, RequestId, RequestKind, RequestStatus, Submitter},
  role::{Actor, Role},
  rules::Action,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<RequestKind> {
  RequestKind::parse(s).map_err(|e| Error::Decode(e.to_string()))
}

pub fn decode_status(s: &str) -> Result<RequestStatus> {
  RequestStatus::parse(s).map_err(|e| Error::Decode(e.to_string()))
}

pub fn decode_role(s: &str) -> Result<Role> {
  Role::parse(s).map_err(|e| Error::Decode(e.to_string()))
}

pub fn decode_action(s: &str) -> Result<Action> {
  Action::parse(s).map_err(|e| Error::Decode(e.to_string()))
}

// ─── Payload ─────────────────────────────────────────────────────────────────

pub fn encode_payload(p: &Payload) -> Result<String> { Ok(serde_json::to_string(p)?) }

pub fn decode_payload(s: &str) -> Result<Payload> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `history` row.
pub struct RawHistoryEntry {
  pub action:      Option<String>,
  pub actor_role:  String,
  pub actor_name:  String,
  pub to_status:   String,
  pub notes:       Option<String>,
  pub recorded_at: String,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      action:     self.action.as_deref().map(decode_action).transpose()?,
      actor_role: decode_role(&self.actor_role)?,
      actor_name: self.actor_name,
      to_status:  decode_status(&self.to_status)?,
      at:         decode_dt(&self.recorded_at)?,
      notes:      self.notes,
    })
  }
}

/// Raw strings read directly from a `requests` row.
pub struct RawRequest {
  pub request_id:     String,
  pub kind:           String,
  pub submitter_id:   String,
  pub submitter_name: String,
  pub submitter_role: String,
  pub payload_json:   String,
  pub status:         String,
  pub notes:          Option<String>,
  pub version:        i64,
  pub created_at:     String,
}

impl RawRequest {
  /// Combine with the request's history rows, already in position order.
  pub fn into_request(self, history: Vec<RawHistoryEntry>) -> Result<Request> {
    let history = history
      .into_iter()
      .map(RawHistoryEntry::into_entry)
      .collect::<Result<Vec<_>>>()?;

    let version = u64::try_from(self.version)
      .map_err(|_| Error::Decode(format!("negative version {}", self.version)))?;
    if history.len() as u64 != version {
      return Err(Error::Decode(format!(
        "request {} has version {version} but {} history rows",
        self.request_id,
        history.len()
      )));
    }

    Ok(Request {
      id: RequestId::new(self.request_id),
      kind: decode_kind(&self.kind)?,
      submitter: Submitter {
        id:   self.submitter_id,
        name: self.submitter_name,
        role: decode_role(&self.submitter_role)?,
      },
      payload: decode_payload(&self.payload_json)?,
      status: decode_status(&self.status)?,
      history,
      notes: self.notes,
      version,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `notifications` row.
pub struct RawNotification {
  pub event_id:    String,
  pub request_id:  String,
  pub kind:        String,
  pub action:      String,
  pub from_status: String,
  pub to_status:   String,
  pub actor_role:  String,
  pub actor_name:  String,
  pub message:     String,
  pub recorded_at: String,
}

impl RawNotification {
  pub fn into_parts(self) -> Result<(AuditEvent, String)> {
    let event = AuditEvent {
      event_id:   Uuid::parse_str(&self.event_id)?,
      request_id: RequestId::new(self.request_id),
      kind:       decode_kind(&self.kind)?,
      action:     decode_action(&self.action)?,
      from:       decode_status(&self.from_status)?,
      to:         decode_status(&self.to_status)?,
      actor:      Actor::new(decode_role(&self.actor_role)?, self.actor_name),
      at:         decode_dt(&self.recorded_at)?,
    };
    Ok((event, self.message))
  }
}
