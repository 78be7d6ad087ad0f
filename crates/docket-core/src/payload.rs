//! Kind-specific request payloads.
//!
//! The transition engine treats payloads as opaque. They are only inspected
//! once, at creation, to check that required fields are present.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, request::RequestKind};

// ─── Line items ──────────────────────────────────────────────────────────────

/// One piece of personal protective equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentLine {
  pub item:     String,
  /// Garment or glove size, where relevant.
  pub size:     Option<String>,
  pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
  pub description:      String,
  pub quantity:         u32,
  pub unit_price_cents: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
  pub material: String,
  pub quantity: u32,
  /// Unit of measure, e.g. "bag", "m3".
  pub unit:     String,
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyEquipmentPayload {
  pub project: String,
  pub items:   Vec<EquipmentLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasePayload {
  pub department:    String,
  pub vendor:        Option<String>,
  pub justification: Option<String>,
  pub items:         Vec<PurchaseLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPayload {
  pub vehicle:     String,
  pub litres:      f64,
  pub odometer_km: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPayload {
  pub site:  String,
  pub items: Vec<MaterialLine>,
}

/// The typed body of a request. The tag doubles as the [`RequestKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum Payload {
  SafetyEquipment(SafetyEquipmentPayload),
  Purchase(PurchasePayload),
  Fuel(FuelPayload),
  Material(MaterialPayload),
}

impl Payload {
  pub fn kind(&self) -> RequestKind {
    match self {
      Self::SafetyEquipment(_) => RequestKind::SafetyEquipment,
      Self::Purchase(_) => RequestKind::Purchase,
      Self::Fuel(_) => RequestKind::Fuel,
      Self::Material(_) => RequestKind::Material,
    }
  }

  /// Fail with [`Error::Validation`] naming the first missing or malformed
  /// field.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::SafetyEquipment(p) => {
        require_text("project", &p.project)?;
        require_items("items", &p.items)?;
        for (i, line) in p.items.iter().enumerate() {
          require_text(&format!("items[{i}].item"), &line.item)?;
          require_quantity(&format!("items[{i}].quantity"), line.quantity)?;
        }
      }
      Self::Purchase(p) => {
        require_text("department", &p.department)?;
        require_items("items", &p.items)?;
        for (i, line) in p.items.iter().enumerate() {
          require_text(&format!("items[{i}].description"), &line.description)?;
          require_quantity(&format!("items[{i}].quantity"), line.quantity)?;
        }
      }
      Self::Fuel(p) => {
        require_text("vehicle", &p.vehicle)?;
        if !p.litres.is_finite() || p.litres <= 0.0 {
          return Err(Error::validation("litres", "must be a positive amount"));
        }
      }
      Self::Material(p) => {
        require_text("site", &p.site)?;
        require_items("items", &p.items)?;
        for (i, line) in p.items.iter().enumerate() {
          require_text(&format!("items[{i}].material"), &line.material)?;
          require_text(&format!("items[{i}].unit"), &line.unit)?;
          require_quantity(&format!("items[{i}].quantity"), line.quantity)?;
        }
      }
    }
    Ok(())
  }
}

fn require_text(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(field, "must not be blank"));
  }
  Ok(())
}

fn require_items<T>(field: &str, items: &[T]) -> Result<()> {
  if items.is_empty() {
    return Err(Error::validation(field, "at least one line item is required"));
  }
  Ok(())
}

fn require_quantity(field: &str, quantity: u32) -> Result<()> {
  if quantity == 0 {
    return Err(Error::validation(field, "must be at least 1"));
  }
  Ok(())
}
