// cartsync/src/model/item.rs

//! The cart line value type and the catalogue descriptor it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a unique cart line: one per `(event_id, ticket_type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
  pub event_id: String,
  pub ticket_type: String,
}

impl CompositeKey {
  pub fn new(event_id: impl Into<String>, ticket_type: impl Into<String>) -> Self {
    Self {
      event_id: event_id.into(),
      ticket_type: ticket_type.into(),
    }
  }
}

impl std::fmt::Display for CompositeKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.event_id, self.ticket_type)
  }
}

/// What a shopper picks from the catalogue: everything a cart line carries
/// except its id and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketListing {
  pub event_id: String,
  pub ticket_type: String,
  /// Price of one ticket in minor currency units.
  pub unit_price: u64,
  pub event_name: String,
  pub event_image: String,
  pub event_date: DateTime<Utc>,
  pub event_location: String,
}

impl TicketListing {
  pub fn key(&self) -> CompositeKey {
    CompositeKey::new(self.event_id.clone(), self.ticket_type.clone())
  }

  pub fn into_item(self, id: String, quantity: u32) -> CartItem {
    CartItem {
      id,
      event_id: self.event_id,
      ticket_type: self.ticket_type,
      unit_price: self.unit_price,
      quantity,
      event_name: self.event_name,
      event_image: self.event_image,
      event_date: self.event_date,
      event_location: self.event_location,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  /// Guest lines carry a synthesized id; account lines carry the server's id.
  /// Not stable across login.
  pub id: String,
  pub event_id: String,
  pub ticket_type: String,
  pub unit_price: u64,
  pub quantity: u32,
  pub event_name: String,
  pub event_image: String,
  pub event_date: DateTime<Utc>,
  pub event_location: String,
}

impl CartItem {
  pub fn key(&self) -> CompositeKey {
    CompositeKey::new(self.event_id.clone(), self.ticket_type.clone())
  }

  pub fn matches_key(&self, key: &CompositeKey) -> bool {
    self.event_id == key.event_id && self.ticket_type == key.ticket_type
  }

  pub fn line_total(&self) -> u64 {
    self.unit_price.saturating_mul(u64::from(self.quantity))
  }

  pub fn listing(&self) -> TicketListing {
    TicketListing {
      event_id: self.event_id.clone(),
      ticket_type: self.ticket_type.clone(),
      unit_price: self.unit_price,
      event_name: self.event_name.clone(),
      event_image: self.event_image.clone(),
      event_date: self.event_date,
      event_location: self.event_location.clone(),
    }
  }
}

/// Builds the id of a guest line from its composite key and creation time.
pub fn guest_item_id(key: &CompositeKey, created_at: DateTime<Utc>) -> String {
  format!(
    "{}-{}-{}",
    key.event_id,
    key.ticket_type,
    created_at.timestamp_millis()
  )
}
