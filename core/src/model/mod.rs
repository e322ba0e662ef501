// cartsync/src/model/mod.rs

pub mod cart;
pub mod item;

pub use cart::Cart;
pub use item::{guest_item_id, CartItem, CompositeKey, TicketListing};
