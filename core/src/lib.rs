// src/lib.rs

//! cartsync: the shopping-cart state core of a ticket-marketplace client.
//!
//! It keeps one consistent answer to "what does the shopper intend to buy"
//! across two stores:
//!  - a device-local guest cart, editable without signing in,
//!  - a server-held account cart, the sole source of truth once signed in.
//!
//! and merges the first into the second exactly once per sign-in.
//!
//! Pieces, leaf first:
//!  - `model`: `CartItem`, `Cart` and the `(event_id, ticket_type)` composite key.
//!  - `adapters`: the local (guest) and remote (account) persistence seams.
//!  - `store`: the observable `CartStore` every screen reads from.
//!  - `reconcile`: the sign-in merge (`max` quantity per shared line).
//!  - `dispatcher`: add/update/remove/clear routed by auth mode.
//!  - `session`: the lifecycle state machine tying it all together.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::model::{Cart, CartItem, CompositeKey, TicketListing};

pub use crate::adapters::{
  FileStorage, InMemoryRemoteCart, InjectedFailure, LocalCartAdapter, LocalStorage, MemoryStorage, RemoteCall,
  RemoteCartApi, RemoteOp,
};

pub use crate::store::{CartStatus, CartStore, Subscription};

pub use crate::auth::{AuthEdge, AuthState, UserIdentity};
pub use crate::config::{CartConfig, MutationOrdering};
pub use crate::dispatcher::{CartMode, MutationDispatcher};
pub use crate::reconcile::{merge_carts, ReconcileOutcome, ReconciliationEngine};
pub use crate::session::{CartPhase, CartSession};

pub use crate::error::{CartError, CartResult, ErrorKind};

/*
    Typical wiring:
    1. Build a `CartSession` once per app session with a `LocalStorage` for
       the guest slot and an `Arc<dyn RemoteCartApi>` for the account cart.
    2. Hand `session.store()` to screens: `snapshot()`, `status()` and
       `subscribe(..)` (keep the `Subscription` alive while the screen is up).
    3. Forward every observation of the auth signal to
       `session.handle_auth_change(&auth).await`; only edges do work.
    4. Route all cart edits through `session.add_item` / `update_quantity` /
       `remove_item` / `clear_cart`, whatever the auth state.
    5. On `ErrorKind::ReconciliationFailed`, offer `session.retry_reconciliation()`.
*/
