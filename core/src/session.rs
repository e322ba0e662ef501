// cartsync/src/session.rs

//! `CartSession`: the one object a client constructs per session and hands to
//! its screens.
//!
//! It owns the cart lifecycle
//!
//! ```text
//! Uninitialized ──► GuestActive ──(sign in, reconcile)──► AuthenticatedActive
//!                        ▲                                        │
//!                        └────────────(sign out)──────────────────┘
//! ```
//!
//! and serializes the work that must not interleave: a reconciliation holds
//! the gate exclusively, mutations share it (or hold it exclusively under
//! `MutationOrdering::Sequenced`).

use crate::adapters::local::{LocalCartAdapter, LocalStorage};
use crate::adapters::remote::RemoteCartApi;
use crate::auth::{AuthEdge, AuthState, UserIdentity};
use crate::config::{CartConfig, MutationOrdering};
use crate::dispatcher::{CartMode, MutationDispatcher};
use crate::error::CartResult;
use crate::model::{Cart, TicketListing};
use crate::reconcile::{ReconcileOutcome, ReconciliationEngine};
use crate::store::CartStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{event, instrument, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartPhase {
  Uninitialized,
  GuestActive,
  AuthenticatedActive,
}

#[derive(Debug)]
struct Lifecycle {
  /// Flipped to `AuthenticatedActive` under the lock before reconciling, so
  /// it doubles as the one-shot guard for the sign-in edge.
  phase: CartPhase,
  /// Set when the last reconciliation failed and left guest lines behind.
  retry_pending: bool,
  user: Option<UserIdentity>,
}

/// What an auth signal asks the session to do once the lifecycle is updated.
enum Transition {
  None,
  Reconcile,
  SignOut,
}

#[allow(dead_code)] // guards are held for their Drop
enum GatePermit<'a> {
  Shared(RwLockReadGuard<'a, ()>),
  Exclusive(RwLockWriteGuard<'a, ()>),
}

pub struct CartSession {
  config: CartConfig,
  store: CartStore,
  local: LocalCartAdapter,
  dispatcher: MutationDispatcher,
  engine: ReconciliationEngine,
  lifecycle: Mutex<Lifecycle>,
  gate: RwLock<()>,
}

impl CartSession {
  /// The store starts out holding whatever guest cart is persisted, so the
  /// first screen renders it without waiting for the auth signal.
  pub fn new(config: CartConfig, storage: Arc<dyn LocalStorage>, remote: Arc<dyn RemoteCartApi>) -> Self {
    let local = LocalCartAdapter::new(storage, config.storage_slot.clone());
    let store = CartStore::with_snapshot(local.load());
    let dispatcher = MutationDispatcher::new(store.clone(), local.clone(), Arc::clone(&remote));
    let engine = ReconciliationEngine::new(store.clone(), local.clone(), remote);
    event!(Level::DEBUG, slot = %config.storage_slot, ordering = ?config.mutation_ordering, "Cart session created.");
    Self {
      config,
      store,
      local,
      dispatcher,
      engine,
      lifecycle: Mutex::new(Lifecycle {
        phase: CartPhase::Uninitialized,
        retry_pending: false,
        user: None,
      }),
      gate: RwLock::new(()),
    }
  }

  pub fn store(&self) -> &CartStore {
    &self.store
  }

  pub fn config(&self) -> &CartConfig {
    &self.config
  }

  pub fn phase(&self) -> CartPhase {
    self.lifecycle.lock().phase
  }

  pub fn user(&self) -> Option<UserIdentity> {
    self.lifecycle.lock().user.clone()
  }

  pub fn retry_pending(&self) -> bool {
    self.lifecycle.lock().retry_pending
  }

  /// Feeds one observation of the auth signal into the lifecycle.
  ///
  /// Only edges act: not-authenticated → authenticated reconciles once,
  /// authenticated → not-authenticated abandons the account cart and restarts
  /// an empty guest cart. Repeated observations of the same state do nothing.
  /// An `Uninitialized` session counts as not authenticated.
  #[instrument(name = "CartSession::handle_auth_change", skip_all, fields(authenticated = auth.is_authenticated()), err(Display))]
  pub async fn handle_auth_change(&self, auth: &AuthState) -> CartResult<AuthEdge> {
    let (edge, transition) = {
      let mut lifecycle = self.lifecycle.lock();
      let was_authenticated = lifecycle.phase == CartPhase::AuthenticatedActive;
      let edge = AuthEdge::between(was_authenticated, auth.is_authenticated());
      let transition = match edge {
        AuthEdge::SignedIn => {
          lifecycle.phase = CartPhase::AuthenticatedActive;
          lifecycle.user = auth.user.clone();
          Transition::Reconcile
        }
        AuthEdge::SignedOut => {
          lifecycle.retry_pending = false;
          lifecycle.phase = CartPhase::GuestActive;
          lifecycle.user = None;
          Transition::SignOut
        }
        AuthEdge::Unchanged => {
          if lifecycle.phase == CartPhase::Uninitialized {
            lifecycle.phase = CartPhase::GuestActive;
            event!(Level::INFO, "Cart session active as guest.");
          } else if auth.is_authenticated() && lifecycle.user != auth.user {
            event!(Level::DEBUG, "Signed-in identity changed without a sign-out; ignoring.");
          }
          Transition::None
        }
      };
      (edge, transition)
    };

    match transition {
      Transition::None => {}
      Transition::Reconcile => {
        event!(Level::INFO, user = ?auth.user, "Signed in, reconciling guest cart.");
        self.reconcile(false).await?;
      }
      Transition::SignOut => {
        event!(Level::INFO, "Signed out, restarting with an empty guest cart.");
        let _permit = self.gate.write().await;
        self.local.clear();
        self.store.set_snapshot(Cart::new());
      }
    }
    Ok(edge)
  }

  /// Re-runs reconciliation after a failed attempt. Returns `Ok(None)` when
  /// there is nothing to retry.
  #[instrument(name = "CartSession::retry_reconciliation", skip_all, err(Display))]
  pub async fn retry_reconciliation(&self) -> CartResult<Option<ReconcileOutcome>> {
    self.reconcile(true).await
  }

  pub async fn add_item(&self, listing: TicketListing, quantity: u32) -> CartResult<()> {
    let (_permit, mode) = self.enter_mutation().await;
    self.dispatcher.add_item(mode, listing, quantity).await
  }

  /// A quantity of zero removes the line.
  pub async fn update_quantity(&self, item_id: &str, quantity: u32) -> CartResult<()> {
    let (_permit, mode) = self.enter_mutation().await;
    self.dispatcher.update_quantity(mode, item_id, quantity).await
  }

  pub async fn remove_item(&self, item_id: &str) -> CartResult<()> {
    let (_permit, mode) = self.enter_mutation().await;
    self.dispatcher.remove_item(mode, item_id).await
  }

  pub async fn clear_cart(&self) -> CartResult<()> {
    let (_permit, mode) = self.enter_mutation().await;
    self.dispatcher.clear_cart(mode).await
  }

  async fn reconcile(&self, only_if_pending: bool) -> CartResult<Option<ReconcileOutcome>> {
    let _permit = self.gate.write().await;
    // A sign-out (or another retry) may have landed while we waited for the gate.
    {
      let lifecycle = self.lifecycle.lock();
      if lifecycle.phase != CartPhase::AuthenticatedActive {
        event!(Level::DEBUG, "Session left the authenticated phase before reconciling; skipping.");
        return Ok(None);
      }
      if only_if_pending && !lifecycle.retry_pending {
        return Ok(None);
      }
    }
    let result = self.engine.run().await;
    self.lifecycle.lock().retry_pending = result.is_err();
    result.map(Some)
  }

  /// Waits for the gate, then reads the mode under it so a mutation never
  /// straddles a lifecycle transition.
  async fn enter_mutation(&self) -> (GatePermit<'_>, CartMode) {
    let permit = match self.config.mutation_ordering {
      MutationOrdering::Overlapping => GatePermit::Shared(self.gate.read().await),
      MutationOrdering::Sequenced => GatePermit::Exclusive(self.gate.write().await),
    };
    let mode = {
      let mut lifecycle = self.lifecycle.lock();
      match lifecycle.phase {
        CartPhase::AuthenticatedActive => CartMode::Authenticated,
        CartPhase::GuestActive => CartMode::Guest,
        CartPhase::Uninitialized => {
          lifecycle.phase = CartPhase::GuestActive;
          event!(Level::INFO, "First mutation before any auth signal; cart session active as guest.");
          CartMode::Guest
        }
      }
    };
    (permit, mode)
  }
}

impl std::fmt::Debug for CartSession {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CartSession")
      .field("config", &self.config)
      .field("store", &self.store)
      .field("lifecycle", &*self.lifecycle.lock())
      .finish_non_exhaustive()
  }
}
