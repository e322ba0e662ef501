// box_office/src/main.rs

//! Walks one shopper through a guest cart, a sign-in merge, account edits,
//! a sign-out and a failed-then-retried sign-in, logging the cart after each
//! step. The guest cart is persisted as JSON under `CART_STORAGE_DIR`.

mod catalog;
mod config;
mod errors;

use crate::catalog::Catalog;
use crate::config::{AppConfig, LogFormat};
use crate::errors::AppError;

use anyhow::Context;
use cartsync::{
  AuthState, CartSession, CartStore, FileStorage, InMemoryRemoteCart, InjectedFailure, RemoteOp, UserIdentity,
};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartSummary {
  step: &'static str,
  lines: Vec<String>,
  item_count: u64,
  total_value: u64,
  is_loading: bool,
  last_error: Option<String>,
}

impl CartSummary {
  fn of(step: &'static str, store: &CartStore) -> Self {
    let status = store.status();
    let lines = store
      .snapshot()
      .iter()
      .map(|item| format!("{} x{} @ {}", item.key(), item.quantity, item.unit_price))
      .collect();
    Self {
      step,
      lines,
      item_count: status.item_count,
      total_value: status.total_value,
      is_loading: status.is_loading,
      last_error: status.last_error.map(|kind| format!("{:?}", kind)),
    }
  }
}

fn log_cart(step: &'static str, store: &CartStore) {
  let summary = CartSummary::of(step, store);
  match serde_json::to_string(&summary) {
    Ok(json) => tracing::info!(cart = %json, "{}", step),
    Err(e) => tracing::warn!(error = %e, "Could not serialise cart summary."),
  }
}

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")); // Allow RUST_LOG override
  match format {
    LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env().context("loading configuration")?;
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting box office demo...");

  let catalog = Catalog::load(app_config.catalog_file.as_deref())?;
  let full = catalog.get("concert-1", "Full")?;
  let half = catalog.get("concert-1", "Half")?;
  let vip = catalog.get("theatre-7", "VIP")?;

  // The account cart already holds one Full ticket, added from another device.
  let remote = Arc::new(InMemoryRemoteCart::new());
  for listing in catalog.listings() {
    remote.add_listing(listing.clone());
  }
  remote.seed_line(full.clone(), 1);

  std::fs::create_dir_all(&app_config.storage_dir)
    .with_context(|| format!("creating {}", app_config.storage_dir.display()))?;
  let storage = Arc::new(FileStorage::new(&app_config.storage_dir));
  let session = CartSession::new(app_config.cart_config(), storage, remote.clone());
  let store = session.store().clone();
  let _sub = session.store().subscribe(|cart| {
    tracing::debug!(lines = cart.len(), tickets = cart.total_item_count(), "Cart snapshot changed.");
  });
  log_cart("Restored guest cart", &store);

  // 1. Guest picks two Full tickets.
  session.handle_auth_change(&AuthState::guest()).await?;
  session.add_item(full.clone(), 2).await?;
  log_cart("Guest added 2 x Full", &store);

  // 2. Sign in: the shared line merges to max(2, 1).
  let shopper = AuthState::signed_in(UserIdentity::new("shopper-1"));
  session.handle_auth_change(&shopper).await?;
  log_cart("Signed in and reconciled", &store);

  // 3. Account edits go to the server and are re-fetched.
  session.add_item(half.clone(), 1).await?;
  let half_line = store
    .snapshot()
    .find_by_key(&half.key())
    .map(|item| item.id.clone())
    .ok_or_else(|| AppError::NotFound(half.key().to_string()))?;
  session.update_quantity(&half_line, 3).await?;
  log_cart("Account cart edited", &store);

  // 4. Sign out: fresh guest cart, account cart untouched.
  session.handle_auth_change(&AuthState::guest()).await?;
  log_cart("Signed out", &store);
  tracing::info!(account_lines = remote.lines().len(), "Account cart kept on the server.");

  // 5. Guest adds a VIP ticket, the next sign-in hits a transport failure.
  session.add_item(vip, 1).await?;
  remote.fail_next(RemoteOp::Add, InjectedFailure::Unavailable);
  match session.handle_auth_change(&shopper).await {
    Ok(edge) => tracing::warn!(?edge, "Sign-in unexpectedly reconciled despite the injected failure."),
    Err(e) => tracing::warn!(error = %e, "Sign-in reconciliation failed; guest cart kept."),
  }
  log_cart("After failed reconciliation", &store);

  // 6. Retry once the server is reachable again.
  let outcome = session.retry_reconciliation().await?;
  tracing::info!(?outcome, "Reconciliation retried.");
  log_cart("After retry", &store);

  tracing::info!(remote_calls = remote.journal().len(), "Box office demo finished.");
  Ok(())
}
