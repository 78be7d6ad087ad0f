//! [`SqliteStore`]: the SQLite implementation of [`RequestStore`] and
//! [`AuditSink`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use docket_core::{
  audit::{AuditEvent, AuditSink},
  request::{NewRequest, Request, RequestId},
  rules::Action,
  store::{ApplyOutcome, Mutation, RequestFilter, RequestStore},
};

use crate::{
  encode::{
    decode_status, encode_dt, encode_payload, RawHistoryEntry, RawNotification, RawRequest,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row loading ─────────────────────────────────────────────────────────────

type RawRow = (RawRequest, Vec<RawHistoryEntry>);

const SELECT_REQUEST: &str = "SELECT request_id, kind, submitter_id, submitter_name,
        submitter_role, payload_json, status, notes, version, created_at
   FROM requests";

fn raw_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRequest> {
  Ok(RawRequest {
    request_id:     row.get(0)?,
    kind:           row.get(1)?,
    submitter_id:   row.get(2)?,
    submitter_name: row.get(3)?,
    submitter_role: row.get(4)?,
    payload_json:   row.get(5)?,
    status:         row.get(6)?,
    notes:          row.get(7)?,
    version:        row.get(8)?,
    created_at:     row.get(9)?,
  })
}

fn load_history(
  conn: &rusqlite::Connection,
  request_id: &str,
) -> rusqlite::Result<Vec<RawHistoryEntry>> {
  let mut stmt = conn.prepare_cached(
    "SELECT action, actor_role, actor_name, to_status, notes, recorded_at
       FROM history
      WHERE request_id = ?1
      ORDER BY position",
  )?;
  stmt
    .query_map(rusqlite::params![request_id], |row| {
      Ok(RawHistoryEntry {
        action:      row.get(0)?,
        actor_role:  row.get(1)?,
        actor_name:  row.get(2)?,
        to_status:   row.get(3)?,
        notes:       row.get(4)?,
        recorded_at: row.get(5)?,
      })
    })?
    .collect()
}

fn load(conn: &rusqlite::Connection, request_id: &str) -> rusqlite::Result<Option<RawRow>> {
  let raw = conn
    .query_row(
      &format!("{SELECT_REQUEST} WHERE request_id = ?1"),
      rusqlite::params![request_id],
      raw_request,
    )
    .optional()?;
  match raw {
    Some(raw) => {
      let history = load_history(conn, &raw.request_id)?;
      Ok(Some((raw, history)))
    }
    None => Ok(None),
  }
}

/// What the compare-and-swap saw, before decoding.
enum RawOutcome {
  Applied(Option<RawRow>),
  Stale(String),
  Missing,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Docket request store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// A persisted audit event with its rendered message.
#[derive(Debug, Clone)]
pub struct Notification {
  pub event:   AuditEvent,
  pub message: String,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Persisted notifications, oldest first, optionally for one request.
  pub async fn notifications(&self, request_id: Option<RequestId>) -> Result<Vec<Notification>> {
    let id_str = request_id.map(|id| id.as_str().to_owned());

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, request_id, kind, action, from_status, to_status,
                  actor_role, actor_name, message, recorded_at
             FROM notifications
            WHERE ?1 IS NULL OR request_id = ?1
            ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawNotification {
              event_id:    row.get(0)?,
              request_id:  row.get(1)?,
              kind:        row.get(2)?,
              action:      row.get(3)?,
              from_status: row.get(4)?,
              to_status:   row.get(5)?,
              actor_role:  row.get(6)?,
              actor_name:  row.get(7)?,
              message:     row.get(8)?,
              recorded_at: row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| {
        let (event, message) = raw.into_parts()?;
        Ok(Notification { event, message })
      })
      .collect()
  }
}

// ─── RequestStore impl ───────────────────────────────────────────────────────

impl RequestStore for SqliteStore {
  type Error = Error;

  async fn insert(&self, input: NewRequest) -> Result<Request> {
    let created_at = Utc::now();
    let kind = input.kind;

    let kind_str       = kind.as_str();
    let submitter_id   = input.submitter.id.clone();
    let submitter_name = input.submitter.name.clone();
    let submitter_role = input.submitter.role.as_str();
    let payload_json   = encode_payload(&input.payload)?;
    let status_str     = kind.initial_status().as_str();
    let notes          = input.notes.clone();
    let at_str         = encode_dt(created_at);

    let id: String = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock before the count, so two connections
        // sharing the file cannot both read the same count.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Requests are never deleted, so the per-kind count only grows.
        let issued: i64 = tx.query_row(
          "SELECT COUNT(*) FROM requests WHERE kind = ?1",
          rusqlite::params![kind_str],
          |r| r.get(0),
        )?;
        let id = RequestId::for_sequence(kind, issued.max(0) as u64);

        tx.execute(
          "INSERT INTO requests (
             request_id, kind, submitter_id, submitter_name, submitter_role,
             payload_json, status, notes, version, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)",
          rusqlite::params![
            id.as_str(),
            kind_str,
            submitter_id,
            submitter_name,
            submitter_role,
            payload_json,
            status_str,
            notes,
            at_str,
          ],
        )?;
        tx.execute(
          "INSERT INTO history (
             request_id, position, action, actor_role, actor_name,
             to_status, notes, recorded_at
           ) VALUES (?1, 0, NULL, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id.as_str(),
            submitter_role,
            submitter_name,
            status_str,
            notes,
            at_str,
          ],
        )?;
        tx.commit()?;
        Ok(id.as_str().to_owned())
      })
      .await?;

    tracing::debug!(request_id = %id, "request row inserted");
    Ok(input.into_request(RequestId::new(id), created_at))
  }

  async fn get(&self, id: RequestId) -> Result<Option<Request>> {
    let id_str = id.as_str().to_owned();

    let raw: Option<RawRow> = self.conn.call(move |conn| Ok(load(conn, &id_str)?)).await?;

    raw
      .map(|(request, history)| request.into_request(history))
      .transpose()
  }

  async fn list<'a>(&'a self, filter: &'a RequestFilter) -> Result<Vec<Request>> {
    let status_str   = filter.status.map(|s| s.as_str());
    let kind_str     = filter.kind.map(|k| k.as_str());
    let submitter_id = filter.submitter_id.clone();

    let raws: Vec<RawRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{SELECT_REQUEST}
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR kind = ?2)
             AND (?3 IS NULL OR submitter_id = ?3)
           ORDER BY seq"
        ))?;
        let requests = stmt
          .query_map(
            rusqlite::params![status_str, kind_str, submitter_id],
            raw_request,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(requests.len());
        for request in requests {
          let history = load_history(conn, &request.request_id)?;
          rows.push((request, history));
        }
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(request, history)| request.into_request(history))
      .collect()
  }

  async fn apply_transition(&self, id: RequestId, mutation: Mutation) -> Result<ApplyOutcome> {
    let id_str   = id.as_str().to_owned();
    let from_str = mutation.expected_status.as_str();
    let version  = i64::try_from(mutation.expected_version)
      .map_err(|_| Error::Decode(format!("version {} out of range", mutation.expected_version)))?;
    let entry    = mutation.entry;
    let to_str   = entry.to_status.as_str();
    let action   = entry.action.map(Action::as_str);
    let role_str = entry.actor_role.as_str();
    let at_str   = encode_dt(entry.at);
    let notes    = mutation.notes;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
          "UPDATE requests
              SET status = ?1, notes = COALESCE(?2, notes), version = version + 1
            WHERE request_id = ?3 AND status = ?4 AND version = ?5",
          rusqlite::params![to_str, notes, id_str, from_str, version],
        )?;

        if changed == 0 {
          let current: Option<String> = tx
            .query_row(
              "SELECT status FROM requests WHERE request_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?;
          return Ok(match current {
            Some(status) => RawOutcome::Stale(status),
            None => RawOutcome::Missing,
          });
        }

        tx.execute(
          "INSERT INTO history (
             request_id, position, action, actor_role, actor_name,
             to_status, notes, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            version,
            action,
            role_str,
            entry.actor_name,
            to_str,
            entry.notes,
            at_str,
          ],
        )?;
        let row = load(&tx, &id_str)?;
        tx.commit()?;
        Ok(RawOutcome::Applied(row))
      })
      .await?;

    match outcome {
      RawOutcome::Applied(Some((request, history))) => {
        Ok(ApplyOutcome::Applied(request.into_request(history)?))
      }
      RawOutcome::Applied(None) => Err(Error::Vanished(id)),
      RawOutcome::Stale(status) => Ok(ApplyOutcome::Stale { current: decode_status(&status)? }),
      RawOutcome::Missing => Ok(ApplyOutcome::Missing),
    }
  }
}

// ─── AuditSink impl ──────────────────────────────────────────────────────────

impl AuditSink for SqliteStore {
  type Error = Error;

  async fn record(&self, event: AuditEvent) -> Result<()> {
    let message    = event.message();
    let event_id   = event.event_id.hyphenated().to_string();
    let request_id = event.request_id.as_str().to_owned();
    let kind       = event.kind.as_str();
    let action     = event.action.as_str();
    let from       = event.from.as_str();
    let to         = event.to.as_str();
    let role       = event.actor.role.as_str();
    let name       = event.actor.name;
    let at_str     = encode_dt(event.at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO notifications (
             event_id, request_id, kind, action, from_status, to_status,
             actor_role, actor_name, message, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            event_id, request_id, kind, action, from, to, role, name, message, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
