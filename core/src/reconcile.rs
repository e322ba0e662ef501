// cartsync/src/reconcile.rs

//! Login-time merge of the guest cart into the account cart.
//!
//! The merge is keyed by `(event_id, ticket_type)`:
//!  - a line only in the account cart is kept as is,
//!  - a line only in the guest cart is kept as is (and created remotely),
//!  - a line in both ends up with `max(remote, local)` tickets, never the sum,
//!    so a cart that was already pushed once is not counted twice.
//!
//! The merged cart is written back as a diff against the fetched account
//! cart: guest-only lines are added, shared lines whose guest quantity is
//! larger are raised with `set_quantity`, and nothing else is touched. Account
//! lines are never removed, so a failure halfway through cannot lose them,
//! and the next run converges because every write is idempotent under the
//! max rule.
//!
//! Running the engine again with an empty guest cart only re-fetches the
//! account cart, which makes a retry after a failure safe.

use crate::adapters::local::LocalCartAdapter;
use crate::adapters::remote::RemoteCartApi;
use crate::error::{CartError, CartResult, ErrorKind};
use crate::model::Cart;
use crate::store::CartStore;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Merges the guest cart into the account cart.
///
/// Account lines keep their position and metadata; guest-only lines follow
/// in guest order.
pub fn merge_carts(local: &Cart, remote: &Cart) -> Cart {
  let mut merged = Cart::new();
  for remote_line in remote {
    let mut line = remote_line.clone();
    if let Some(local_line) = local.find_by_key(&remote_line.key()) {
      line.quantity = line.quantity.max(local_line.quantity);
    }
    merged.push_unchecked(line);
  }
  for local_line in local {
    if remote.find_by_key(&local_line.key()).is_none() {
      merged.push_unchecked(local_line.clone());
    }
  }
  merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
  /// The guest cart was empty; the account cart was fetched and published.
  FetchedOnly { published_lines: usize },
  /// Guest lines were merged into the account cart.
  Merged {
    local_lines: usize,
    remote_lines: usize,
    published_lines: usize,
  },
}

#[derive(Clone)]
pub struct ReconciliationEngine {
  store: CartStore,
  local: LocalCartAdapter,
  remote: Arc<dyn RemoteCartApi>,
}

impl ReconciliationEngine {
  pub fn new(store: CartStore, local: LocalCartAdapter, remote: Arc<dyn RemoteCartApi>) -> Self {
    Self { store, local, remote }
  }

  /// Runs one reconciliation. Callers make sure it never overlaps another
  /// reconciliation or a mutation.
  ///
  /// On failure the guest cart is left in place, the best available cart is
  /// published with `last_error = ReconciliationFailed`, and
  /// `CartError::ReconciliationFailed` is returned.
  #[instrument(name = "ReconciliationEngine::run", skip_all, err(Display))]
  pub async fn run(&self) -> CartResult<ReconcileOutcome> {
    let _loading = self.store.begin_loading();
    let local = self.local.load();

    if local.is_empty() {
      event!(Level::DEBUG, "Guest cart empty, fetching account cart only.");
      return match self.remote.fetch_cart().await {
        Ok(remote) => {
          let published_lines = remote.len();
          self.store.set_snapshot(remote);
          Ok(ReconcileOutcome::FetchedOnly { published_lines })
        }
        Err(e) => Err(self.fall_back(local, e).await),
      };
    }

    match self.merge_and_persist(&local).await {
      Ok((remote_lines, published)) => {
        let published_lines = published.len();
        self.store.set_snapshot(published);
        self.local.clear();
        event!(
          Level::INFO,
          local_lines = local.len(),
          remote_lines,
          published_lines,
          "Guest cart reconciled into account cart."
        );
        Ok(ReconcileOutcome::Merged {
          local_lines: local.len(),
          remote_lines,
          published_lines,
        })
      }
      Err(e) => Err(self.fall_back(local, e).await),
    }
  }

  /// Fetches the account cart, writes the lines the merge changes and
  /// re-fetches it so the published lines carry server-issued ids.
  async fn merge_and_persist(&self, local: &Cart) -> CartResult<(usize, Cart)> {
    let remote = self.remote.fetch_cart().await?;
    let merged = merge_carts(local, &remote);
    event!(
      Level::DEBUG,
      local_lines = local.len(),
      remote_lines = remote.len(),
      merged_lines = merged.len(),
      "Persisting merged cart."
    );

    for line in &merged {
      match remote.find_by_key(&line.key()) {
        Some(existing) if existing.quantity < line.quantity => {
          self.remote.set_quantity(&existing.id, line.quantity).await?;
        }
        Some(_) => {}
        None => {
          self
            .remote
            .add_item(&line.event_id, &line.ticket_type, line.quantity)
            .await?;
        }
      }
    }

    let published = self.remote.fetch_cart().await?;
    Ok((remote.len(), published))
  }

  /// Publishes whatever the account cart looks like now, or the guest cart
  /// when even that cannot be fetched, so the shopper's tickets stay visible.
  async fn fall_back(&self, local: Cart, cause: CartError) -> CartError {
    event!(Level::WARN, error = %cause, "Reconciliation failed, keeping guest cart for a retry.");
    match self.remote.fetch_cart().await {
      Ok(remote) => self.store.set_snapshot_with_error(remote, ErrorKind::ReconciliationFailed),
      Err(e) => {
        event!(Level::WARN, error = %e, "Account cart unreachable, publishing guest cart.");
        self.store.set_snapshot_with_error(local, ErrorKind::ReconciliationFailed);
      }
    }
    CartError::ReconciliationFailed { source: Box::new(cause) }
  }
}

impl std::fmt::Debug for ReconciliationEngine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ReconciliationEngine")
      .field("local", &self.local)
      .finish_non_exhaustive()
  }
}
