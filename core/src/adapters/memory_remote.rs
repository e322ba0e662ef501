// cartsync/src/adapters/memory_remote.rs

//! An in-process stand-in for the authenticated cart API.
//!
//! Behaves like the real server as far as the cart core can observe: it
//! issues its own line ids, increments lines on repeated adds, enforces an
//! optional per-listing stock limit and rejects unknown listings. Failures
//! can be injected per operation to exercise the error paths.

use crate::adapters::remote::RemoteCartApi;
use crate::error::{CartError, CartResult};
use crate::model::{Cart, CartItem, CompositeKey, TicketListing};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
  Fetch,
  Add,
  SetQuantity,
  Remove,
  Clear,
}

/// One call as received by the server, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
  Fetch,
  Add {
    event_id: String,
    ticket_type: String,
    quantity: u32,
  },
  SetQuantity {
    item_id: String,
    quantity: u32,
  },
  Remove {
    item_id: String,
  },
  Clear,
}

impl RemoteCall {
  pub fn op(&self) -> RemoteOp {
    match self {
      RemoteCall::Fetch => RemoteOp::Fetch,
      RemoteCall::Add { .. } => RemoteOp::Add,
      RemoteCall::SetQuantity { .. } => RemoteOp::SetQuantity,
      RemoteCall::Remove { .. } => RemoteOp::Remove,
      RemoteCall::Clear => RemoteOp::Clear,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
  Unavailable,
  Rejected(String),
}

impl InjectedFailure {
  fn into_error(self, op: RemoteOp) -> CartError {
    match self {
      InjectedFailure::Unavailable => CartError::unavailable(format!("injected transport failure on {:?}", op)),
      InjectedFailure::Rejected(reason) => CartError::rejected(reason),
    }
  }
}

#[derive(Default)]
struct RemoteState {
  lines: Vec<CartItem>,
  catalog: HashMap<CompositeKey, TicketListing>,
  stock_limits: HashMap<CompositeKey, u32>,
  pending_failures: HashMap<RemoteOp, VecDeque<InjectedFailure>>,
  unavailable: bool,
  journal: Vec<RemoteCall>,
}

impl RemoteState {
  /// Records the call and returns the failure it should produce, if any.
  fn admit(&mut self, call: RemoteCall) -> CartResult<()> {
    let op = call.op();
    self.journal.push(call);
    if self.unavailable {
      return Err(InjectedFailure::Unavailable.into_error(op));
    }
    if let Some(failure) = self.pending_failures.get_mut(&op).and_then(VecDeque::pop_front) {
      event!(Level::DEBUG, ?op, ?failure, "In-memory remote injecting failure.");
      return Err(failure.into_error(op));
    }
    Ok(())
  }

  fn check_stock(&self, key: &CompositeKey, wanted: u32) -> CartResult<()> {
    match self.stock_limits.get(key) {
      Some(limit) if wanted > *limit => Err(CartError::rejected(format!(
        "stock exceeded for {}: {} requested, {} available",
        key, wanted, limit
      ))),
      _ => Ok(()),
    }
  }
}

#[derive(Default)]
pub struct InMemoryRemoteCart {
  state: Mutex<RemoteState>,
}

impl InMemoryRemoteCart {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_listing(self, listing: TicketListing) -> Self {
    self.add_listing(listing);
    self
  }

  pub fn with_stock_limit(self, key: CompositeKey, limit: u32) -> Self {
    self.set_stock_limit(key, limit);
    self
  }

  pub fn add_listing(&self, listing: TicketListing) {
    self.state.lock().catalog.insert(listing.key(), listing);
  }

  pub fn set_stock_limit(&self, key: CompositeKey, limit: u32) {
    self.state.lock().stock_limits.insert(key, limit);
  }

  /// Puts a line straight into the account cart, bypassing the journal.
  /// Models state left behind by an earlier session or another device.
  pub fn seed_line(&self, listing: TicketListing, quantity: u32) -> String {
    let mut guard = self.state.lock();
    let key = listing.key();
    guard.catalog.entry(key.clone()).or_insert_with(|| listing.clone());
    if let Some(line) = guard.lines.iter_mut().find(|line| line.matches_key(&key)) {
      line.quantity = quantity;
      return line.id.clone();
    }
    let id = Uuid::new_v4().to_string();
    guard.lines.push(listing.into_item(id.clone(), quantity));
    id
  }

  /// Makes the next call of `op` fail. Failures queue up per operation.
  pub fn fail_next(&self, op: RemoteOp, failure: InjectedFailure) {
    self
      .state
      .lock()
      .pending_failures
      .entry(op)
      .or_default()
      .push_back(failure);
  }

  /// While set, every call fails as a transport failure.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.state.lock().unavailable = unavailable;
  }

  /// The account cart as the server holds it, without recording a call.
  pub fn lines(&self) -> Vec<CartItem> {
    self.state.lock().lines.clone()
  }

  pub fn journal(&self) -> Vec<RemoteCall> {
    self.state.lock().journal.clone()
  }

  pub fn call_count(&self, op: RemoteOp) -> usize {
    self.state.lock().journal.iter().filter(|call| call.op() == op).count()
  }

  pub fn clear_journal(&self) {
    self.state.lock().journal.clear();
  }
}

#[async_trait]
impl RemoteCartApi for InMemoryRemoteCart {
  async fn fetch_cart(&self) -> CartResult<Cart> {
    let mut guard = self.state.lock();
    guard.admit(RemoteCall::Fetch)?;
    Cart::from_items(guard.lines.clone())
      .map_err(|e| CartError::unavailable(format!("server returned a malformed cart: {}", e)))
  }

  async fn add_item(&self, event_id: &str, ticket_type: &str, quantity: u32) -> CartResult<()> {
    let mut guard = self.state.lock();
    guard.admit(RemoteCall::Add {
      event_id: event_id.to_string(),
      ticket_type: ticket_type.to_string(),
      quantity,
    })?;
    if quantity == 0 {
      return Err(CartError::rejected("quantity must be at least 1"));
    }

    let key = CompositeKey::new(event_id, ticket_type);
    let listing = guard
      .catalog
      .get(&key)
      .cloned()
      .ok_or_else(|| CartError::rejected(format!("unknown listing {}", key)))?;

    let existing = guard.lines.iter().position(|line| line.matches_key(&key));
    let current = existing.map_or(0, |idx| guard.lines[idx].quantity);
    let wanted = current.saturating_add(quantity);
    guard.check_stock(&key, wanted)?;

    match existing {
      Some(idx) => guard.lines[idx].quantity = wanted,
      None => {
        let id = Uuid::new_v4().to_string();
        guard.lines.push(listing.into_item(id, quantity));
      }
    }
    Ok(())
  }

  async fn set_quantity(&self, item_id: &str, quantity: u32) -> CartResult<()> {
    let mut guard = self.state.lock();
    guard.admit(RemoteCall::SetQuantity {
      item_id: item_id.to_string(),
      quantity,
    })?;
    if quantity == 0 {
      return Err(CartError::rejected("quantity must be at least 1"));
    }
    let idx = guard
      .lines
      .iter()
      .position(|line| line.id == item_id)
      .ok_or_else(|| CartError::rejected(format!("no cart line '{}'", item_id)))?;
    let key = guard.lines[idx].key();
    guard.check_stock(&key, quantity)?;
    guard.lines[idx].quantity = quantity;
    Ok(())
  }

  async fn remove_item(&self, item_id: &str) -> CartResult<()> {
    let mut guard = self.state.lock();
    guard.admit(RemoteCall::Remove {
      item_id: item_id.to_string(),
    })?;
    let before = guard.lines.len();
    guard.lines.retain(|line| line.id != item_id);
    if guard.lines.len() == before {
      return Err(CartError::rejected(format!("no cart line '{}'", item_id)));
    }
    Ok(())
  }

  async fn clear_cart(&self) -> CartResult<()> {
    let mut guard = self.state.lock();
    guard.admit(RemoteCall::Clear)?;
    guard.lines.clear();
    Ok(())
  }
}
