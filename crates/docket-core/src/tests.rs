//! Engine tests against the in-memory store.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use strum::IntoEnumIterator;

use crate::{
  Error,
  audit::{AuditEvent, AuditSink, MemorySink},
  engine::TransitionEngine,
  memory::MemoryStore,
  payload::{
    EquipmentLine, FuelPayload, MaterialLine, MaterialPayload, Payload, PurchaseLine,
    PurchasePayload, SafetyEquipmentPayload,
  },
  request::{NewRequest, Request, RequestId, RequestKind, RequestStatus, Submitter},
  role::{Actor, Role},
  rules::{Action, RuleTable},
  store::{ApplyOutcome, Mutation, RequestFilter, RequestStore},
};

type Engine = TransitionEngine<MemoryStore, MemorySink>;

fn engine() -> Engine { TransitionEngine::new(MemoryStore::new(), MemorySink::new()) }

fn technician() -> Submitter {
  Submitter { id: "tech-1".into(), name: "Jordan".into(), role: Role::Technician }
}

fn safety_request() -> NewRequest {
  NewRequest::new(
    RequestKind::SafetyEquipment,
    technician(),
    Payload::SafetyEquipment(SafetyEquipmentPayload {
      project: "Substation 4".into(),
      items:   vec![EquipmentLine {
        item:     "Hard hat".into(),
        size:     None,
        quantity: 1,
      }],
    }),
  )
}

fn purchase_request() -> NewRequest {
  NewRequest::new(
    RequestKind::Purchase,
    Submitter { id: "hr-2".into(), name: "Avery".into(), role: Role::Technician },
    Payload::Purchase(PurchasePayload {
      department:    "HR".into(),
      vendor:        Some("Office Supplies Ltd".into()),
      justification: None,
      items:         vec![PurchaseLine {
        description:      "Printer toner".into(),
        quantity:         3,
        unit_price_cents: Some(4_500),
      }],
    }),
  )
}

fn fuel_request() -> NewRequest {
  NewRequest::new(
    RequestKind::Fuel,
    Submitter { id: "drv-9".into(), name: "Robin".into(), role: Role::Driver },
    Payload::Fuel(FuelPayload { vehicle: "TRK-7".into(), litres: 60.0, odometer_km: None }),
  )
}

fn material_request() -> NewRequest {
  NewRequest::new(
    RequestKind::Material,
    technician(),
    Payload::Material(MaterialPayload {
      site:  "Depot North".into(),
      items: vec![MaterialLine { material: "Cement".into(), quantity: 12, unit: "bag".into() }],
    }),
  )
}

fn im() -> Actor { Actor::new(Role::ImplementationManager, "Morgan") }
fn pm() -> Actor { Actor::new(Role::ProjectManager, "Casey") }
fn warehouse() -> Actor { Actor::new(Role::Warehouse, "Sam") }
fn ehs() -> Actor { Actor::new(Role::Ehs, "Drew") }
fn procurement() -> Actor { Actor::new(Role::Procurement, "Kai") }

/// Drive a fresh safety-equipment request up to `status`.
async fn safety_at(e: &Engine, status: RequestStatus) -> Request {
  let mut r = e.create(safety_request()).await.unwrap();
  let steps = [
    (RequestStatus::Acknowledged, Action::Acknowledge, im()),
    (RequestStatus::Approved, Action::Approve, pm()),
    (RequestStatus::Issued, Action::Issue, warehouse()),
    (RequestStatus::Closed, Action::Close, ehs()),
  ];
  for (reached, action, actor) in steps {
    if r.status == status {
      break;
    }
    r = e.transition(&r.id, action, &actor, None).await.unwrap();
    assert_eq!(r.status, reached);
  }
  r
}

// ─── Scenario ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn safety_equipment_walkthrough() {
  let e = engine();

  // 1. create
  let r = e.create(safety_request()).await.unwrap();
  assert_eq!(r.id.as_str(), "SR-100");
  assert_eq!(r.status, RequestStatus::Pending);
  assert_eq!(r.history.len(), 1);

  // 2. acknowledge
  let r = e.transition(&r.id, Action::Acknowledge, &im(), None).await.unwrap();
  assert_eq!(r.status, RequestStatus::Acknowledged);
  assert_eq!(r.history.len(), 2);

  // 3. repeat
  let err = e.transition(&r.id, Action::Acknowledge, &im(), None).await.unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { status: RequestStatus::Acknowledged, .. }));

  // 4. wrong role
  let err = e
    .transition(&r.id, Action::Approve, &warehouse(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized { role: Role::Warehouse, .. }));

  // 5. approve
  let r = e.transition(&r.id, Action::Approve, &pm(), None).await.unwrap();
  assert_eq!(r.status, RequestStatus::Approved);

  // 6. cannot skip issuance
  let err = e.transition(&r.id, Action::Close, &ehs(), None).await.unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { status: RequestStatus::Approved, .. }));

  let r = e.transition(&r.id, Action::Issue, &warehouse(), None).await.unwrap();
  let r = e.transition(&r.id, Action::Close, &ehs(), None).await.unwrap();
  assert_eq!(r.status, RequestStatus::Closed);
  assert_eq!(r.history.len(), 5);
  assert_eq!(r.version, 5);
}

#[tokio::test]
async fn history_records_actor_and_target() {
  let e = engine();
  let r = safety_at(&e, RequestStatus::Approved).await;

  let last = r.history.last().unwrap();
  assert_eq!(last.action, Some(Action::Approve));
  assert_eq!(last.actor_role, Role::ProjectManager);
  assert_eq!(last.actor_name, "Casey");
  assert_eq!(last.to_status, RequestStatus::Approved);
  assert!(r.history.windows(2).all(|w| w[0].at <= w[1].at));
}

#[tokio::test]
async fn reissuing_is_rejected() {
  let e = engine();
  let r = safety_at(&e, RequestStatus::Issued).await;
  let err = e.transition(&r.id, Action::Issue, &warehouse(), None).await.unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { .. }));
  assert_eq!(e.get(&r.id).await.unwrap().history.len(), 4);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
  let e = engine();
  let id = RequestId::new("SR-999");
  assert!(matches!(e.get(&id).await, Err(Error::NotFound(_))));
  assert!(matches!(
    e.transition(&id, Action::Acknowledge, &im(), None).await,
    Err(Error::NotFound(_))
  ));
}

#[tokio::test]
async fn invalid_payload_is_not_stored() {
  let e = engine();
  let mut input = safety_request();
  if let Payload::SafetyEquipment(p) = &mut input.payload {
    p.items.clear();
  }
  assert!(matches!(e.create(input).await, Err(Error::Validation { .. })));
  assert!(e.list(&RequestFilter::default()).await.unwrap().is_empty());
}

// ─── Purchase / fuel / material ──────────────────────────────────────────────

#[tokio::test]
async fn purchase_can_be_rejected_only_while_pending() {
  let e = engine();

  let rejected = e.create(purchase_request()).await.unwrap();
  let rejected = e
    .transition(&rejected.id, Action::Reject, &procurement(), Some("over budget".into()))
    .await
    .unwrap();
  assert_eq!(rejected.status, RequestStatus::Rejected);
  assert_eq!(rejected.notes.as_deref(), Some("over budget"));

  let approved = e.create(purchase_request()).await.unwrap();
  assert_eq!(approved.id.as_str(), "PR-101");
  let approved = e
    .transition(&approved.id, Action::Approve, &procurement(), None)
    .await
    .unwrap();
  let err = e
    .transition(&approved.id, Action::Reject, &procurement(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { status: RequestStatus::Approved, .. }));

  let done = e
    .transition(&approved.id, Action::Complete, &procurement(), None)
    .await
    .unwrap();
  assert_eq!(done.status, RequestStatus::Completed);
}

#[tokio::test]
async fn fuel_and_material_follow_their_tables() {
  let e = engine();
  let logistics = Actor::new(Role::Logistics, "Quinn");

  let fuel = e.create(fuel_request()).await.unwrap();
  let fuel = e.transition(&fuel.id, Action::Approve, &logistics, None).await.unwrap();
  let fuel = e.transition(&fuel.id, Action::Complete, &logistics, None).await.unwrap();
  assert_eq!(fuel.status, RequestStatus::Completed);

  let material = e.create(material_request()).await.unwrap();
  assert!(matches!(
    e.transition(&material.id, Action::Acknowledge, &logistics, None).await,
    Err(Error::Unauthorized { .. })
  ));
  let material = e
    .transition(&material.id, Action::Acknowledge, &warehouse(), None)
    .await
    .unwrap();
  assert_eq!(material.status, RequestStatus::Acknowledged);
}

#[tokio::test]
async fn notes_are_last_writer_wins() {
  let e = engine();
  let mut input = safety_request();
  input.notes = Some("urgent".into());
  let r = e.create(input).await.unwrap();
  assert_eq!(r.notes.as_deref(), Some("urgent"));

  let r = e
    .transition(&r.id, Action::Acknowledge, &im(), Some("seen".into()))
    .await
    .unwrap();
  assert_eq!(r.notes.as_deref(), Some("seen"));

  // A transition without notes leaves the previous notes in place.
  let r = e.transition(&r.id, Action::Approve, &pm(), None).await.unwrap();
  assert_eq!(r.notes.as_deref(), Some("seen"));
  assert_eq!(r.history[1].notes.as_deref(), Some("seen"));
  assert_eq!(r.history[2].notes, None);
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_the_authorized_role_can_act() {
  let e = engine();
  let rules = RuleTable::standard();
  let r = e.create(safety_request()).await.unwrap();

  for action in Action::iter() {
    for role in Role::iter() {
      if rules.is_authorized(r.kind, r.status, action, role) {
        continue;
      }
      let actor = Actor::new(role, "someone");
      let err = e.transition(&r.id, action, &actor, None).await.unwrap_err();
      if rules.resolve(r.kind, r.status, action).is_some() {
        assert!(matches!(err, Error::Unauthorized { .. }), "{action} by {role}");
      } else {
        assert!(matches!(err, Error::InvalidTransition { .. }), "{action} by {role}");
      }
    }
  }

  let unchanged = e.get(&r.id).await.unwrap();
  assert_eq!(unchanged.status, RequestStatus::Pending);
  assert_eq!(unchanged.history.len(), 1);
  assert!(e.sink().events().await.is_empty());
}

#[tokio::test]
async fn terminal_requests_absorb_every_action() {
  let e = engine();
  let logistics = Actor::new(Role::Logistics, "Quinn");

  let closed = safety_at(&e, RequestStatus::Closed).await;

  let rejected = e.create(purchase_request()).await.unwrap();
  let rejected = e
    .transition(&rejected.id, Action::Reject, &procurement(), None)
    .await
    .unwrap();

  let completed = e.create(fuel_request()).await.unwrap();
  e.transition(&completed.id, Action::Approve, &logistics, None).await.unwrap();
  let completed = e
    .transition(&completed.id, Action::Complete, &logistics, None)
    .await
    .unwrap();

  for terminal in [&closed, &rejected, &completed] {
    assert!(RuleTable::standard().is_terminal(terminal.kind, terminal.status));
    for action in Action::iter() {
      for role in Role::iter() {
        let result = e
          .transition(&terminal.id, action, &Actor::new(role, "anyone"), None)
          .await;
        assert!(
          matches!(result, Err(Error::InvalidTransition { .. })),
          "{action} by {role} on {}",
          terminal.status
        );
      }
    }
    let after = e.get(&terminal.id).await.unwrap();
    assert_eq!(after.status, terminal.status);
    assert_eq!(after.history.len(), terminal.history.len());
  }
}

#[tokio::test]
async fn statuses_stay_within_declared_states() {
  let e = engine();
  let rules = RuleTable::standard();
  safety_at(&e, RequestStatus::Issued).await;
  e.create(purchase_request()).await.unwrap();
  e.create(fuel_request()).await.unwrap();

  for r in e.list(&RequestFilter::default()).await.unwrap() {
    let declared = rules.declared_states(r.kind);
    assert!(declared.contains(&r.status));
    for entry in &r.history {
      assert!(declared.contains(&entry.to_status));
    }
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_transitions_apply_once() {
  let e = Arc::new(engine());
  let r = e.create(safety_request()).await.unwrap();

  let mut handles = Vec::new();
  for i in 0..8 {
    let e = Arc::clone(&e);
    let id = r.id.clone();
    handles.push(tokio::spawn(async move {
      let actor = Actor::new(Role::ImplementationManager, format!("im-{i}"));
      e.transition(&id, Action::Acknowledge, &actor, None).await
    }));
  }

  let mut won = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => won += 1,
      Err(err) => assert!(matches!(err, Error::InvalidTransition { .. })),
    }
  }
  assert_eq!(won, 1);
  assert_eq!(e.get(&r.id).await.unwrap().history.len(), 2);
  assert_eq!(e.sink().events().await.len(), 1);
}

#[tokio::test]
async fn stale_mutation_is_refused_by_the_store() {
  let store = MemoryStore::new();
  let r = store.insert(safety_request()).await.unwrap();

  let mutation = Mutation {
    expected_status:  RequestStatus::Pending,
    expected_version: r.version + 1,
    entry:            r.history[0].clone(),
    notes:            None,
  };
  let outcome = store.apply_transition(r.id.clone(), mutation).await.unwrap();
  assert!(matches!(outcome, ApplyOutcome::Stale { current: RequestStatus::Pending }));

  let missing = Mutation {
    expected_status:  RequestStatus::Pending,
    expected_version: 1,
    entry:            r.history[0].clone(),
    notes:            None,
  };
  let outcome = store.apply_transition(RequestId::new("SR-404"), missing).await.unwrap();
  assert!(matches!(outcome, ApplyOutcome::Missing));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_and_preserves_insertion_order() {
  let e = engine();
  let a = e.create(safety_request()).await.unwrap();
  let b = e.create(fuel_request()).await.unwrap();
  let c = e.create(safety_request()).await.unwrap();
  e.transition(&c.id, Action::Acknowledge, &im(), None).await.unwrap();

  let ids = |rs: Vec<Request>| rs.into_iter().map(|r| r.id).collect::<Vec<_>>();

  let all = e.list(&RequestFilter::default()).await.unwrap();
  assert_eq!(ids(all), vec![a.id.clone(), b.id.clone(), c.id.clone()]);

  let safety = RequestFilter { kind: Some(RequestKind::SafetyEquipment), ..Default::default() };
  assert_eq!(ids(e.list(&safety).await.unwrap()), vec![a.id.clone(), c.id.clone()]);

  let pending = RequestFilter { status: Some(RequestStatus::Pending), ..Default::default() };
  assert_eq!(ids(e.list(&pending).await.unwrap()), vec![a.id.clone(), b.id.clone()]);

  let by_driver = RequestFilter { submitter_id: Some("drv-9".into()), ..Default::default() };
  assert_eq!(ids(e.list(&by_driver).await.unwrap()), vec![b.id]);

  // Restartable: a second identical query yields the same sequence.
  assert_eq!(
    ids(e.list(&safety).await.unwrap()),
    ids(e.list(&safety).await.unwrap())
  );
}

#[tokio::test]
async fn inbox_and_available_actions_follow_the_table() {
  let e = engine();
  let a = e.create(safety_request()).await.unwrap();
  let b = safety_at(&e, RequestStatus::Acknowledged).await;
  let p = e.create(purchase_request()).await.unwrap();

  let im_inbox = e.inbox(Role::ImplementationManager).await.unwrap();
  assert_eq!(im_inbox.iter().map(|r| &r.id).collect::<Vec<_>>(), vec![&a.id]);

  let pm_inbox = e.inbox(Role::ProjectManager).await.unwrap();
  assert_eq!(pm_inbox.iter().map(|r| &r.id).collect::<Vec<_>>(), vec![&b.id]);

  assert_eq!(
    e.available_actions(&p.id, Role::Procurement).await.unwrap(),
    vec![Action::Approve, Action::Reject]
  );
  assert!(e.available_actions(&p.id, Role::Ehs).await.unwrap().is_empty());
}

// ─── Audit ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn each_transition_emits_one_event() {
  let e = engine();
  let r = safety_at(&e, RequestStatus::Approved).await;

  let events = e.sink().events().await;
  assert_eq!(events.len(), 2);
  assert_eq!(events[0].from, RequestStatus::Pending);
  assert_eq!(events[0].to, RequestStatus::Acknowledged);
  assert_eq!(
    events[0].message(),
    format!("Safety equipment request {} has been acknowledged by Morgan", r.id)
  );
  assert_eq!(events[1].action, Action::Approve);
}

/// A sink that fails while `down` is set.
#[derive(Default)]
struct FlakySink {
  down:      AtomicBool,
  delivered: MemorySink,
}

#[derive(Debug, thiserror::Error)]
#[error("notification service unreachable")]
struct Unreachable;

impl AuditSink for FlakySink {
  type Error = Unreachable;

  async fn record(&self, event: AuditEvent) -> Result<(), Unreachable> {
    if self.down.load(Ordering::SeqCst) {
      return Err(Unreachable);
    }
    let _ = self.delivered.record(event).await;
    Ok(())
  }
}

#[tokio::test]
async fn sink_failure_does_not_roll_back() {
  let sink = FlakySink::default();
  sink.down.store(true, Ordering::SeqCst);
  let e = TransitionEngine::new(MemoryStore::new(), sink);

  let r = e.create(safety_request()).await.unwrap();
  let r = e.transition(&r.id, Action::Acknowledge, &im(), None).await.unwrap();
  assert_eq!(r.status, RequestStatus::Acknowledged);
  assert_eq!(e.get(&r.id).await.unwrap().status, RequestStatus::Acknowledged);

  let queued = e.undelivered().await;
  assert_eq!(queued.len(), 1);
  assert_eq!(e.retry_undelivered().await, 1);

  e.sink().down.store(false, Ordering::SeqCst);
  assert_eq!(e.retry_undelivered().await, 0);
  let delivered = e.sink().delivered.events().await;
  assert_eq!(delivered.len(), 1);
  assert_eq!(delivered[0].event_id, queued[0].event_id);
}

#[tokio::test]
async fn next_successful_delivery_flushes_the_backlog() {
  let sink = FlakySink::default();
  sink.down.store(true, Ordering::SeqCst);
  let e = TransitionEngine::new(MemoryStore::new(), sink);

  let a = e.create(safety_request()).await.unwrap();
  let b = e.create(safety_request()).await.unwrap();
  e.transition(&a.id, Action::Acknowledge, &im(), None).await.unwrap();
  e.transition(&b.id, Action::Acknowledge, &im(), None).await.unwrap();
  assert_eq!(e.undelivered().await.len(), 2);

  e.sink().down.store(false, Ordering::SeqCst);
  e.transition(&a.id, Action::Approve, &pm(), None).await.unwrap();

  assert!(e.undelivered().await.is_empty());
  assert_eq!(e.sink().delivered.events().await.len(), 3);
}

#[tokio::test]
async fn undelivered_queue_drops_oldest_past_its_limit() {
  let sink = FlakySink::default();
  sink.down.store(true, Ordering::SeqCst);
  let e = TransitionEngine::new(MemoryStore::new(), sink).with_queue_limit(2);

  let mut ids = Vec::new();
  for _ in 0..3 {
    let r = e.create(safety_request()).await.unwrap();
    e.transition(&r.id, Action::Acknowledge, &im(), None).await.unwrap();
    ids.push(r.id);
  }

  let queued = e.undelivered().await;
  assert_eq!(queued.len(), 2);
  assert_eq!(queued[0].request_id, ids[1]);
  assert_eq!(queued[1].request_id, ids[2]);
}
