// cartsync/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartError {
  /// The persisted guest cart could not be decoded.
  /// Recovered inside the local adapter; never returned by a public operation.
  #[error("Local cart data is corrupt: {reason}")]
  LocalStoreCorrupt { reason: String },

  #[error("Remote cart is unavailable. Source: {source}")]
  RemoteUnavailable {
    #[source]
    source: AnyhowError,
  },

  #[error("Remote cart rejected the operation: {reason}")]
  RemoteRejected { reason: String },

  #[error("Cart reconciliation failed. Source: {source}")]
  ReconciliationFailed {
    #[source]
    source: Box<CartError>,
  },

  /// Lines that break a cart invariant (duplicate key or id, zero quantity).
  #[error("Invalid cart: {reason}")]
  InvalidCart { reason: String },

  #[error("Invalid quantity {quantity}: must be at least 1")]
  InvalidQuantity { quantity: u32 },

  #[error("No cart line with id '{item_id}'")]
  ItemNotFound { item_id: String },
}

/// Coarse classification of a failure, published on the store as `last_error`
/// for observers that only need to pick a message or a retry affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  LocalStoreCorrupt,
  RemoteUnavailable,
  RemoteRejected,
  ReconciliationFailed,
  InvalidInput,
}

impl CartError {
  pub fn unavailable(message: impl Into<String>) -> Self {
    CartError::RemoteUnavailable {
      source: AnyhowError::msg(message.into()),
    }
  }

  pub fn rejected(reason: impl Into<String>) -> Self {
    CartError::RemoteRejected { reason: reason.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      CartError::LocalStoreCorrupt { .. } => ErrorKind::LocalStoreCorrupt,
      CartError::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
      CartError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
      CartError::ReconciliationFailed { .. } => ErrorKind::ReconciliationFailed,
      CartError::InvalidCart { .. } | CartError::InvalidQuantity { .. } | CartError::ItemNotFound { .. } => {
        ErrorKind::InvalidInput
      }
    }
  }

  /// True for failures that came back from the remote cart API.
  pub fn is_remote(&self) -> bool {
    matches!(
      self,
      CartError::RemoteUnavailable { .. } | CartError::RemoteRejected { .. }
    )
  }
}

// Remote adapters usually talk to a transport that reports untyped errors.
// Anything that reaches us through anyhow is treated as a transport failure,
// unless it already wraps a CartError.
impl From<AnyhowError> for CartError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<CartError>() {
      Ok(cart_err) => cart_err,
      Err(err) => CartError::RemoteUnavailable { source: err },
    }
  }
}

pub type CartResult<T, E = CartError> = std::result::Result<T, E>;
