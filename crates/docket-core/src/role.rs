//! Roles and actors.
//!
//! Roles form a closed set. Unknown role strings are rejected when parsed,
//! never carried through to an authorization lookup.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result};

/// A job function recognised by the rule table.
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
pub enum Role {
  Technician,
  Driver,
  ImplementationManager,
  ProjectManager,
  Warehouse,
  Ehs,
  Procurement,
  Logistics,
}

impl Role {
  /// Parse a role string, rejecting anything outside the closed set.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::Unrecognised {
      field: "role",
      value: s.to_owned(),
    })
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

/// The role and display name of whoever performs a transition.
///
/// Supplied by the identity provider and trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub role: Role,
  pub name: String,
}

impl Actor {
  pub fn new(role: Role, name: impl Into<String>) -> Self {
    Self { role, name: name.into() }
  }
}
