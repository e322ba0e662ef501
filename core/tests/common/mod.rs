// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use cartsync::{
  Cart, CartConfig, CartResult, CartSession, InMemoryRemoteCart, MemoryStorage, RemoteCartApi, RemoteOp,
  TicketListing,
};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::Level;

// --- Catalogue fixtures ---
pub fn listing(event_id: &str, ticket_type: &str, unit_price: u64) -> TicketListing {
  TicketListing {
    event_id: event_id.to_string(),
    ticket_type: ticket_type.to_string(),
    unit_price,
    event_name: format!("Event {}", event_id),
    event_image: format!("https://img.example.com/{}.jpg", event_id),
    event_date: Utc.with_ymd_and_hms(2026, 11, 21, 20, 0, 0).unwrap(),
    event_location: "Main Hall".to_string(),
  }
}

pub fn concert_full() -> TicketListing {
  listing("concert-1", "Full", 5_000)
}

pub fn concert_half() -> TicketListing {
  listing("concert-1", "Half", 2_500)
}

pub fn theatre_vip() -> TicketListing {
  listing("theatre-7", "VIP", 12_000)
}

/// A remote that knows the standard fixtures.
pub fn catalogue() -> InMemoryRemoteCart {
  InMemoryRemoteCart::new()
    .with_listing(concert_full())
    .with_listing(concert_half())
    .with_listing(theatre_vip())
}

pub fn catalogue_remote() -> Arc<InMemoryRemoteCart> {
  Arc::new(catalogue())
}

pub struct Harness {
  pub session: Arc<CartSession>,
  pub storage: Arc<MemoryStorage>,
  pub remote: Arc<InMemoryRemoteCart>,
}

pub fn harness() -> Harness {
  harness_with(CartConfig::default(), catalogue_remote())
}

pub fn harness_with(config: CartConfig, remote: Arc<InMemoryRemoteCart>) -> Harness {
  let storage = Arc::new(MemoryStorage::new());
  let session = Arc::new(CartSession::new(config, storage.clone(), remote.clone()));
  Harness {
    session,
    storage,
    remote,
  }
}

/// Quantity per `(event_id, ticket_type)`, sorted, for order-insensitive asserts.
pub fn quantities(cart: &Cart) -> Vec<(String, String, u32)> {
  let mut lines: Vec<_> = cart
    .iter()
    .map(|item| (item.event_id.clone(), item.ticket_type.clone(), item.quantity))
    .collect();
  lines.sort();
  lines
}

pub fn line(event_id: &str, ticket_type: &str, quantity: u32) -> (String, String, u32) {
  (event_id.to_string(), ticket_type.to_string(), quantity)
}

pub fn remote_quantities(remote: &InMemoryRemoteCart) -> Vec<(String, String, u32)> {
  quantities(&Cart::from_items(remote.lines()).unwrap())
}

// --- A remote whose calls can be held at the network boundary ---
pub struct GatedRemote {
  pub inner: Arc<InMemoryRemoteCart>,
  gates: Mutex<HashMap<RemoteOp, Arc<Semaphore>>>,
  entered: Mutex<HashMap<RemoteOp, usize>>,
}

impl GatedRemote {
  pub fn new(inner: Arc<InMemoryRemoteCart>) -> Self {
    Self {
      inner,
      gates: Mutex::new(HashMap::new()),
      entered: Mutex::new(HashMap::new()),
    }
  }

  /// Every following call of `op` waits until `release` lets it through.
  pub fn hold(&self, op: RemoteOp) {
    self.gates.lock().insert(op, Arc::new(Semaphore::new(0)));
  }

  pub fn release(&self, op: RemoteOp, calls: usize) {
    if let Some(gate) = self.gates.lock().get(&op) {
      gate.add_permits(calls);
    }
  }

  /// Calls of `op` that reached the remote, held or not.
  pub fn entered(&self, op: RemoteOp) -> usize {
    self.entered.lock().get(&op).copied().unwrap_or(0)
  }

  async fn pass(&self, op: RemoteOp) {
    *self.entered.lock().entry(op).or_insert(0) += 1;
    let gate = self.gates.lock().get(&op).cloned();
    if let Some(gate) = gate {
      gate.acquire().await.expect("gate closed").forget();
    }
  }
}

#[async_trait]
impl RemoteCartApi for GatedRemote {
  async fn fetch_cart(&self) -> CartResult<Cart> {
    self.pass(RemoteOp::Fetch).await;
    self.inner.fetch_cart().await
  }

  async fn add_item(&self, event_id: &str, ticket_type: &str, quantity: u32) -> CartResult<()> {
    self.pass(RemoteOp::Add).await;
    self.inner.add_item(event_id, ticket_type, quantity).await
  }

  async fn set_quantity(&self, item_id: &str, quantity: u32) -> CartResult<()> {
    self.pass(RemoteOp::SetQuantity).await;
    self.inner.set_quantity(item_id, quantity).await
  }

  async fn remove_item(&self, item_id: &str) -> CartResult<()> {
    self.pass(RemoteOp::Remove).await;
    self.inner.remove_item(item_id).await
  }

  async fn clear_cart(&self) -> CartResult<()> {
    self.pass(RemoteOp::Clear).await;
    self.inner.clear_cart().await
  }
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while !condition() {
    if tokio::time::Instant::now() > deadline {
      panic!("condition not reached in time");
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
}

/// Counts listener notifications.
pub fn counting_listener(counter: &Arc<AtomicUsize>) -> impl Fn(&Cart) + Send + Sync + 'static {
  let counter = Arc::clone(counter);
  move |_cart: &Cart| {
    counter.fetch_add(1, Ordering::SeqCst);
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
