// cartsync/src/adapters/remote.rs

//! Contract of the authenticated cart API.
//!
//! The transport, endpoints, authentication headers and timeouts all live
//! behind an implementation of this trait. Every operation may fail with
//! `CartError::RemoteUnavailable` (no response) or `CartError::RemoteRejected`
//! (the server refused, e.g. not enough stock).

use crate::error::CartResult;
use crate::model::Cart;
use async_trait::async_trait;

#[async_trait]
pub trait RemoteCartApi: Send + Sync {
  /// `GET` the account's full cart. Lines carry server-issued ids.
  /// A response that breaks the cart invariants is reported as
  /// `RemoteUnavailable`, like any other unusable response.
  async fn fetch_cart(&self) -> CartResult<Cart>;

  /// `POST {eventId, ticketType, quantity}`. The server increments an existing
  /// line with the same composite key or creates a new one.
  async fn add_item(&self, event_id: &str, ticket_type: &str, quantity: u32) -> CartResult<()>;

  /// `PATCH` the quantity of line `item_id`.
  async fn set_quantity(&self, item_id: &str, quantity: u32) -> CartResult<()>;

  /// `DELETE` line `item_id`.
  async fn remove_item(&self, item_id: &str) -> CartResult<()>;

  /// `DELETE` every line.
  async fn clear_cart(&self) -> CartResult<()>;
}
