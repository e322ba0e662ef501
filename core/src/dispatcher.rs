// cartsync/src/dispatcher.rs

//! Routes cart mutations to the guest cart or the account cart.
//!
//! The two branches follow different consistency policies:
//!  - `CartMode::Guest` edits a copy of the published snapshot, persists it
//!    locally and publishes it. Nothing can disagree with it, so the edit is
//!    applied optimistically. Guest edits are serialized on `guest_lock`, so
//!    two concurrent edits never start from the same snapshot.
//!  - `CartMode::Authenticated` never patches the snapshot. It calls the
//!    remote operation and then always re-fetches the account cart, because
//!    the server may apply stock limits or validation the client cannot
//!    predict. On failure the previous snapshot stays published.

use crate::adapters::local::LocalCartAdapter;
use crate::adapters::remote::RemoteCartApi;
use crate::error::{CartError, CartResult};
use crate::model::{Cart, TicketListing};
use crate::store::CartStore;
use chrono::Utc;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartMode {
  Guest,
  Authenticated,
}

#[derive(Clone)]
pub struct MutationDispatcher {
  store: CartStore,
  local: LocalCartAdapter,
  remote: Arc<dyn RemoteCartApi>,
  // Held for the whole copy-edit-save-publish of a guest edit. Never held
  // across an await.
  guest_lock: Arc<Mutex<()>>,
}

impl MutationDispatcher {
  pub fn new(store: CartStore, local: LocalCartAdapter, remote: Arc<dyn RemoteCartApi>) -> Self {
    Self {
      store,
      local,
      remote,
      guest_lock: Arc::new(Mutex::new(())),
    }
  }

  #[instrument(
    name = "MutationDispatcher::add_item",
    skip_all,
    fields(mode = ?mode, event_id = %listing.event_id, ticket_type = %listing.ticket_type, quantity = quantity),
    err(Display)
  )]
  pub async fn add_item(&self, mode: CartMode, listing: TicketListing, quantity: u32) -> CartResult<()> {
    if quantity == 0 {
      return Err(self.reject(CartError::InvalidQuantity { quantity }));
    }
    match mode {
      CartMode::Guest => self.apply_guest(|cart| cart.add(listing, quantity, Utc::now()).map(|_| ())),
      CartMode::Authenticated => {
        self
          .apply_remote(
            self
              .remote
              .add_item(&listing.event_id, &listing.ticket_type, quantity),
          )
          .await
      }
    }
  }

  /// Sets the quantity of line `item_id`; zero removes the line.
  #[instrument(name = "MutationDispatcher::update_quantity", skip(self), err(Display))]
  pub async fn update_quantity(&self, mode: CartMode, item_id: &str, quantity: u32) -> CartResult<()> {
    match mode {
      CartMode::Guest => self.apply_guest(|cart| cart.set_quantity(item_id, quantity)),
      CartMode::Authenticated if quantity == 0 => self.apply_remote(self.remote.remove_item(item_id)).await,
      CartMode::Authenticated => {
        self
          .apply_remote(self.remote.set_quantity(item_id, quantity))
          .await
      }
    }
  }

  #[instrument(name = "MutationDispatcher::remove_item", skip(self), err(Display))]
  pub async fn remove_item(&self, mode: CartMode, item_id: &str) -> CartResult<()> {
    match mode {
      CartMode::Guest => self.apply_guest(|cart| cart.remove(item_id).map(|_| ())),
      CartMode::Authenticated => self.apply_remote(self.remote.remove_item(item_id)).await,
    }
  }

  /// Empties the cart. The guest cart is wiped in both modes so stale guest
  /// lines cannot come back after a later logout.
  #[instrument(name = "MutationDispatcher::clear_cart", skip(self), err(Display))]
  pub async fn clear_cart(&self, mode: CartMode) -> CartResult<()> {
    match mode {
      CartMode::Guest => {
        let _guard = self.guest_lock.lock();
        self.local.clear();
        self.store.set_snapshot(Cart::new());
        Ok(())
      }
      CartMode::Authenticated => {
        self.local.clear();
        self.apply_remote(self.remote.clear_cart()).await
      }
    }
  }

  fn apply_guest<F>(&self, edit: F) -> CartResult<()>
  where
    F: FnOnce(&mut Cart) -> CartResult<()>,
  {
    let _guard = self.guest_lock.lock();
    let mut cart = Cart::clone(&self.store.snapshot());
    edit(&mut cart).map_err(|e| self.reject(e))?;
    self.local.save(&cart);
    self.store.set_snapshot(cart);
    Ok(())
  }

  async fn apply_remote<Fut>(&self, mutation: Fut) -> CartResult<()>
  where
    Fut: Future<Output = CartResult<()>>,
  {
    let _loading = self.store.begin_loading();
    let refreshed = async {
      mutation.await?;
      self.remote.fetch_cart().await
    }
    .await;

    match refreshed {
      Ok(cart) => {
        self.store.set_snapshot(cart);
        Ok(())
      }
      Err(e) => {
        event!(Level::WARN, error = %e, "Remote cart mutation failed, keeping previous snapshot.");
        Err(self.reject(e))
      }
    }
  }

  fn reject(&self, error: CartError) -> CartError {
    self.store.record_error(error.kind());
    error
  }
}

impl std::fmt::Debug for MutationDispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MutationDispatcher")
      .field("store", &self.store)
      .field("local", &self.local)
      .finish_non_exhaustive()
  }
}
