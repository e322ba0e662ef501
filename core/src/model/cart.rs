// cartsync/src/model/cart.rs

//! The `Cart` collection and its composite-key-aware edits.
//!
//! Every edit here keeps the cart invariants:
//!  - at most one line per `(event_id, ticket_type)`,
//!  - line ids are unique within the cart,
//!  - every line has `quantity >= 1`.

use crate::error::{CartError, CartResult};
use crate::model::item::{guest_item_id, CartItem, CompositeKey, TicketListing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Ordered collection of cart lines. Serialized as a plain JSON array;
/// deserializing checks the cart invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
  items: Vec<CartItem>,
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a cart from lines, rejecting data that breaks a cart invariant.
  pub fn from_items(items: Vec<CartItem>) -> CartResult<Self> {
    let cart = Self { items };
    cart.validate()?;
    Ok(cart)
  }

  pub fn items(&self) -> &[CartItem] {
    &self.items
  }

  pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
    self.items.iter()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Σ quantity
  pub fn total_item_count(&self) -> u64 {
    self.items.iter().map(|item| u64::from(item.quantity)).sum()
  }

  /// Σ quantity × unit_price, in minor currency units.
  pub fn total_value(&self) -> u64 {
    self
      .items
      .iter()
      .fold(0u64, |acc, item| acc.saturating_add(item.line_total()))
  }

  pub fn find_by_key(&self, key: &CompositeKey) -> Option<&CartItem> {
    self.items.iter().find(|item| item.matches_key(key))
  }

  pub fn find_by_id(&self, item_id: &str) -> Option<&CartItem> {
    self.items.iter().find(|item| item.id == item_id)
  }

  /// Adds `quantity` tickets of `listing`. An existing line with the same
  /// composite key is incremented; otherwise a guest line is appended.
  pub fn add(&mut self, listing: TicketListing, quantity: u32, now: DateTime<Utc>) -> CartResult<&CartItem> {
    if quantity == 0 {
      return Err(CartError::InvalidQuantity { quantity });
    }
    let key = listing.key();
    let idx = match self.items.iter().position(|item| item.matches_key(&key)) {
      Some(idx) => {
        let line = &mut self.items[idx];
        line.quantity = line.quantity.saturating_add(quantity);
        idx
      }
      None => {
        let id = self.unused_guest_id(&key, now);
        self.items.push(listing.into_item(id, quantity));
        self.items.len() - 1
      }
    };
    Ok(&self.items[idx])
  }

  /// The derived guest id, suffixed with a random token when another line
  /// already carries it (e.g. `("a-b", "c")` and `("a", "b-c")` in the same
  /// millisecond).
  fn unused_guest_id(&self, key: &CompositeKey, now: DateTime<Utc>) -> String {
    let mut id = guest_item_id(key, now);
    while self.find_by_id(&id).is_some() {
      id = format!("{}-{}", guest_item_id(key, now), Uuid::new_v4().simple());
    }
    id
  }

  /// Sets the quantity of the line `item_id`. A quantity of zero removes it.
  pub fn set_quantity(&mut self, item_id: &str, quantity: u32) -> CartResult<()> {
    if quantity == 0 {
      return self.remove(item_id).map(|_| ());
    }
    let line = self
      .items
      .iter_mut()
      .find(|item| item.id == item_id)
      .ok_or_else(|| CartError::ItemNotFound {
        item_id: item_id.to_string(),
      })?;
    line.quantity = quantity;
    Ok(())
  }

  pub fn remove(&mut self, item_id: &str) -> CartResult<CartItem> {
    let idx = self
      .items
      .iter()
      .position(|item| item.id == item_id)
      .ok_or_else(|| CartError::ItemNotFound {
        item_id: item_id.to_string(),
      })?;
    Ok(self.items.remove(idx))
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }

  pub(crate) fn push_unchecked(&mut self, item: CartItem) {
    self.items.push(item);
  }

  /// Checks the cart invariants.
  pub fn validate(&self) -> CartResult<()> {
    let mut keys = HashSet::with_capacity(self.items.len());
    let mut ids = HashSet::with_capacity(self.items.len());
    for item in &self.items {
      if item.quantity == 0 {
        return Err(CartError::InvalidCart {
          reason: format!("line '{}' has quantity 0", item.id),
        });
      }
      if !keys.insert(item.key()) {
        return Err(CartError::InvalidCart {
          reason: format!("duplicate line for {}", item.key()),
        });
      }
      if !ids.insert(item.id.as_str()) {
        return Err(CartError::InvalidCart {
          reason: format!("duplicate line id '{}'", item.id),
        });
      }
    }
    Ok(())
  }
}

impl TryFrom<Vec<CartItem>> for Cart {
  type Error = CartError;

  fn try_from(items: Vec<CartItem>) -> CartResult<Self> {
    Self::from_items(items)
  }
}

impl From<Cart> for Vec<CartItem> {
  fn from(cart: Cart) -> Self {
    cart.items
  }
}

impl<'a> IntoIterator for &'a Cart {
  type Item = &'a CartItem;
  type IntoIter = std::slice::Iter<'a, CartItem>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}
