// cartsync/src/adapters/mod.rs

//! The two durable copies of a cart: device-local (guest) and remote (account).

pub mod local;
pub mod memory_remote;
pub mod remote;

pub use local::{FileStorage, LocalCartAdapter, LocalStorage, MemoryStorage};
pub use memory_remote::{InMemoryRemoteCart, InjectedFailure, RemoteCall, RemoteOp};
pub use remote::RemoteCartApi;
