// box_office/src/errors.rs

use cartsync::CartError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Catalogue Error: {0}")]
  Catalog(#[from] serde_json::Error),

  #[error("Listing Not Found: {0}")]
  NotFound(String),

  #[error("Storage Error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Cart Error: {source}")]
  Cart {
    #[from] // Allows `?` on cartsync calls
    source: CartError,
  },
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
