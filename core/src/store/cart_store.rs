// cartsync/src/store/cart_store.rs

//! The observable, in-memory holder of "the current cart".
//!
//! Screens read from the store and subscribe to it; only the reconciliation
//! engine and the mutation dispatcher replace its snapshot.
//!
//! IMPORTANT: the internal `parking_lot` lock is never held across an `.await`
//! point and never held while listeners run, so a listener may read the store
//! (or drop its own subscription) without deadlocking.
//!
//! Publishes are serialized on a separate reentrant `publish` lock that covers
//! the state update, the watch send and the listener calls. Every observer
//! therefore sees snapshots in the order they were stored, and the last value
//! any of them sees is the stored snapshot. A listener may publish again from
//! its own thread; it must not wait on a publish running on another thread.

use crate::error::ErrorKind;
use crate::model::Cart;
use parking_lot::{ReentrantMutex, RwLock};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{event, Level};

pub type Listener = Arc<dyn Fn(&Cart) + Send + Sync + 'static>;

struct StoreState {
  snapshot: Arc<Cart>,
  in_flight: usize,
  last_error: Option<ErrorKind>,
  listeners: BTreeMap<u64, Listener>,
  next_listener_id: u64,
}

struct StoreInner {
  state: RwLock<StoreState>,
  publish: ReentrantMutex<()>,
  watch_tx: watch::Sender<Arc<Cart>>,
}

/// Cheaply cloneable handle; all clones share one snapshot.
#[derive(Clone)]
pub struct CartStore {
  inner: Arc<StoreInner>,
}

/// Read model for passive observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartStatus {
  pub is_loading: bool,
  pub last_error: Option<ErrorKind>,
  pub item_count: u64,
  pub total_value: u64,
}

impl CartStore {
  pub fn new() -> Self {
    Self::with_snapshot(Cart::new())
  }

  pub fn with_snapshot(cart: Cart) -> Self {
    let snapshot = Arc::new(cart);
    let (watch_tx, _) = watch::channel(Arc::clone(&snapshot));
    Self {
      inner: Arc::new(StoreInner {
        state: RwLock::new(StoreState {
          snapshot,
          in_flight: 0,
          last_error: None,
          listeners: BTreeMap::new(),
          next_listener_id: 0,
        }),
        publish: ReentrantMutex::new(()),
        watch_tx,
      }),
    }
  }

  /// The currently published cart. Unchanged snapshots compare `Arc::ptr_eq`.
  pub fn snapshot(&self) -> Arc<Cart> {
    Arc::clone(&self.inner.state.read().snapshot)
  }

  pub fn is_loading(&self) -> bool {
    self.inner.state.read().in_flight > 0
  }

  pub fn last_error(&self) -> Option<ErrorKind> {
    self.inner.state.read().last_error
  }

  pub fn status(&self) -> CartStatus {
    let guard = self.inner.state.read();
    CartStatus {
      is_loading: guard.in_flight > 0,
      last_error: guard.last_error,
      item_count: guard.snapshot.total_item_count(),
      total_value: guard.snapshot.total_value(),
    }
  }

  /// Registers `listener` to run after every snapshot replacement.
  /// The listener stays registered until the returned handle is dropped.
  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&Cart) + Send + Sync + 'static,
  {
    let mut guard = self.inner.state.write();
    let id = guard.next_listener_id;
    guard.next_listener_id += 1;
    guard.listeners.insert(id, Arc::new(listener));
    event!(Level::TRACE, listener_id = id, "Cart listener subscribed.");
    Subscription {
      id,
      store: Arc::downgrade(&self.inner),
    }
  }

  /// A watch receiver that always holds the latest published snapshot.
  pub fn watch(&self) -> watch::Receiver<Arc<Cart>> {
    self.inner.watch_tx.subscribe()
  }

  pub fn listener_count(&self) -> usize {
    self.inner.state.read().listeners.len()
  }

  /// Replaces the snapshot, clears `last_error` and notifies once.
  pub(crate) fn set_snapshot(&self, cart: Cart) {
    self.replace(cart, None);
  }

  /// Replaces the snapshot, records `error` and notifies once.
  pub(crate) fn set_snapshot_with_error(&self, cart: Cart, error: ErrorKind) {
    self.replace(cart, Some(error));
  }

  /// Records a failure without touching the snapshot or notifying.
  pub(crate) fn record_error(&self, error: ErrorKind) {
    self.inner.state.write().last_error = Some(error);
  }

  pub(crate) fn begin_loading(&self) -> LoadingGuard {
    self.inner.state.write().in_flight += 1;
    LoadingGuard { store: self.clone() }
  }

  fn replace(&self, cart: Cart, error: Option<ErrorKind>) {
    let snapshot = Arc::new(cart);
    let _publish = self.inner.publish.lock();
    let listeners: Vec<Listener> = {
      let mut guard = self.inner.state.write();
      guard.snapshot = Arc::clone(&snapshot);
      guard.last_error = error;
      guard.listeners.values().cloned().collect()
    };
    event!(
      Level::DEBUG,
      lines = snapshot.len(),
      item_count = snapshot.total_item_count(),
      listeners = listeners.len(),
      "Cart snapshot published."
    );
    self.inner.watch_tx.send_replace(Arc::clone(&snapshot));
    for listener in listeners {
      listener(&snapshot);
    }
  }
}

impl Default for CartStore {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for CartStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let guard = self.inner.state.read();
    f.debug_struct("CartStore")
      .field("lines", &guard.snapshot.len())
      .field("in_flight", &guard.in_flight)
      .field("last_error", &guard.last_error)
      .field("listeners", &guard.listeners.len())
      .finish()
  }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
  id: u64,
  store: Weak<StoreInner>,
}

impl Subscription {
  pub fn id(&self) -> u64 {
    self.id
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.store.upgrade() {
      inner.state.write().listeners.remove(&self.id);
      event!(Level::TRACE, listener_id = self.id, "Cart listener unsubscribed.");
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription").field("id", &self.id).finish()
  }
}

/// Marks one remote-touching operation as in flight for as long as it lives.
pub(crate) struct LoadingGuard {
  store: CartStore,
}

impl Drop for LoadingGuard {
  fn drop(&mut self) {
    let mut guard = self.store.inner.state.write();
    guard.in_flight = guard.in_flight.saturating_sub(1);
  }
}
