//! The declarative rule table and the authorization gate.
//!
//! Every permitted status change is one row: `(kind, action, from) -> to`,
//! performed by exactly one role. Adding a kind or a role is a change to
//! [`STANDARD_RULES`], not to the engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  request::{RequestKind, RequestStatus},
  role::Role,
};

// ─── Actions ─────────────────────────────────────────────────────────────────

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
pub enum Action {
  Acknowledge,
  Approve,
  Issue,
  Close,
  Reject,
  Complete,
}

impl Action {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::Unrecognised {
      field: "action",
      value: s.to_owned(),
    })
  }

  pub fn as_str(self) -> &'static str { self.into() }

  /// Verb used in notifications ("has been acknowledged").
  pub fn past_tense(self) -> &'static str {
    match self {
      Self::Acknowledge => "acknowledged",
      Self::Approve => "approved",
      Self::Issue => "issued",
      Self::Close => "closed",
      Self::Reject => "rejected",
      Self::Complete => "completed",
    }
  }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// A single permitted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
  pub kind:   RequestKind,
  pub action: Action,
  pub from:   RequestStatus,
  pub to:     RequestStatus,
  pub role:   Role,
}

const fn rule(
  kind: RequestKind,
  action: Action,
  from: RequestStatus,
  to: RequestStatus,
  role: Role,
) -> Rule {
  Rule { kind, action, from, to, role }
}

use Action as A;
use RequestKind as K;
use RequestStatus as S;

/// The rules in force for every request kind.
pub const STANDARD_RULES: &[Rule] = &[
  // pending -> acknowledged -> approved -> issued -> closed
  rule(K::SafetyEquipment, A::Acknowledge, S::Pending, S::Acknowledged, Role::ImplementationManager),
  rule(K::SafetyEquipment, A::Approve, S::Acknowledged, S::Approved, Role::ProjectManager),
  rule(K::SafetyEquipment, A::Issue, S::Approved, S::Issued, Role::Warehouse),
  rule(K::SafetyEquipment, A::Close, S::Issued, S::Closed, Role::Ehs),
  // Rejection is only reachable from pending.
  rule(K::Purchase, A::Approve, S::Pending, S::Approved, Role::Procurement),
  rule(K::Purchase, A::Reject, S::Pending, S::Rejected, Role::Procurement),
  rule(K::Purchase, A::Complete, S::Approved, S::Completed, Role::Procurement),
  rule(K::Fuel, A::Approve, S::Pending, S::Approved, Role::Logistics),
  rule(K::Fuel, A::Complete, S::Approved, S::Completed, Role::Logistics),
  rule(K::Material, A::Acknowledge, S::Pending, S::Acknowledged, Role::Warehouse),
  rule(K::Material, A::Complete, S::Acknowledged, S::Completed, Role::Warehouse),
];

// ─── Table ───────────────────────────────────────────────────────────────────

/// A validated set of [`Rule`]s with the lookups the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTable {
  rules: Vec<Rule>,
}

impl RuleTable {
  /// Build a table, rejecting two rules for the same `(kind, from, action)`.
  pub fn new(rules: Vec<Rule>) -> Result<Self> {
    let mut seen = HashSet::new();
    for r in &rules {
      if !seen.insert((r.kind, r.from, r.action)) {
        return Err(Error::InvalidRules(format!(
          "more than one rule for {} {} from {}",
          r.kind, r.action, r.from
        )));
      }
      if r.from == r.to {
        return Err(Error::InvalidRules(format!(
          "{} {} does not change status ({})",
          r.kind, r.action, r.from
        )));
      }
    }
    Ok(Self { rules })
  }

  pub fn standard() -> Self { Self { rules: STANDARD_RULES.to_vec() } }

  pub fn rules(&self) -> &[Rule] { &self.rules }

  /// The rule that applies when `action` is invoked on a `kind` request
  /// currently in `from`, if any.
  pub fn resolve(
    &self,
    kind: RequestKind,
    from: RequestStatus,
    action: Action,
  ) -> Option<&Rule> {
    self
      .rules
      .iter()
      .find(|r| r.kind == kind && r.from == from && r.action == action)
  }

  /// Whether `role` may perform `action` on a `kind` request in `from`.
  pub fn is_authorized(
    &self,
    kind: RequestKind,
    from: RequestStatus,
    action: Action,
    role: Role,
  ) -> bool {
    self.resolve(kind, from, action).is_some_and(|r| r.role == role)
  }

  /// Actions `role` can take right now on a `kind` request in `status`.
  pub fn actions_for(
    &self,
    kind: RequestKind,
    status: RequestStatus,
    role: Role,
  ) -> Vec<Action> {
    self
      .rules
      .iter()
      .filter(|r| r.kind == kind && r.from == status && r.role == role)
      .map(|r| r.action)
      .collect()
  }

  /// Every status a `kind` request may hold, initial status first.
  pub fn declared_states(&self, kind: RequestKind) -> Vec<RequestStatus> {
    let mut states = vec![kind.initial_status()];
    for r in self.rules.iter().filter(|r| r.kind == kind) {
      for s in [r.from, r.to] {
        if !states.contains(&s) {
          states.push(s);
        }
      }
    }
    states
  }

  /// A status with no outgoing rule is absorbing.
  pub fn is_terminal(&self, kind: RequestKind, status: RequestStatus) -> bool {
    !self.rules.iter().any(|r| r.kind == kind && r.from == status)
  }
}

impl Default for RuleTable {
  fn default() -> Self { Self::standard() }
}
