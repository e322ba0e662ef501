// cartsync/examples/guest_to_login.rs

use cartsync::{
  AuthState, CartConfig, CartResult, CartSession, InMemoryRemoteCart, MemoryStorage, TicketListing, UserIdentity,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::info;

fn concert(ticket_type: &str, unit_price: u64) -> TicketListing {
  TicketListing {
    event_id: "concert-1".to_string(),
    ticket_type: ticket_type.to_string(),
    unit_price,
    event_name: "Midnight Strings".to_string(),
    event_image: "https://img.example.com/concert-1.jpg".to_string(),
    event_date: Utc.with_ymd_and_hms(2026, 11, 21, 20, 0, 0).unwrap(),
    event_location: "Main Hall".to_string(),
  }
}

#[tokio::main]
async fn main() -> CartResult<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Guest to Login Example ---");

  // 1. The account cart already holds one Full ticket from another device.
  let remote = Arc::new(InMemoryRemoteCart::new().with_listing(concert("Full", 5_000)));
  remote.seed_line(concert("Full", 5_000), 1);

  // 2. A fresh session starts as a guest.
  let session = CartSession::new(CartConfig::default(), Arc::new(MemoryStorage::new()), remote.clone());
  let _sub = session.store().subscribe(|cart| {
    info!(lines = cart.len(), tickets = cart.total_item_count(), "Cart changed.");
  });
  session.handle_auth_change(&AuthState::guest()).await?;

  // 3. The guest picks two Full tickets.
  session.add_item(concert("Full", 5_000), 2).await?;
  info!(status = ?session.store().status(), "Guest cart ready.");

  // 4. Signing in merges: max(2, 1) = 2, never 3.
  session
    .handle_auth_change(&AuthState::signed_in(UserIdentity::new("user-42")))
    .await?;

  for item in session.store().snapshot().iter() {
    info!(
      "{} / {} x{} (line id {})",
      item.event_id, item.ticket_type, item.quantity, item.id
    );
  }
  info!(calls = remote.journal().len(), "Remote calls made.");
  Ok(())
}
