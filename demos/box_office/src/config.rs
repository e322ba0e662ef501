// box_office/src/config.rs

use crate::errors::{AppError, Result};
use cartsync::{CartConfig, MutationOrdering};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Text,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  /// Directory holding one JSON file per guest-cart slot.
  pub storage_dir: PathBuf,
  pub storage_slot: String,
  pub mutation_ordering: MutationOrdering,
  pub log_format: LogFormat,
  /// Optional JSON array of listings replacing the built-in catalogue.
  pub catalog_file: Option<PathBuf>,
}

impl AppConfig {
  /// Reads the process environment (and `.env`, if present). Called before
  /// tracing is initialised, so it does not log.
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|value| !value.trim().is_empty());

    let storage_dir = get_env("CART_STORAGE_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|| env::temp_dir().join("box_office"));
    let storage_slot = get_env("CART_STORAGE_SLOT").unwrap_or_else(|| cartsync::config::DEFAULT_STORAGE_SLOT.to_string());
    let mutation_ordering = match get_env("CART_MUTATION_ORDERING") {
      Some(raw) => raw
        .parse::<MutationOrdering>()
        .map_err(|e| AppError::Config(format!("Invalid CART_MUTATION_ORDERING: {}", e)))?,
      None => MutationOrdering::default(),
    };
    let log_format = match get_env("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
      None | Some("text") => LogFormat::Text,
      Some("json") => LogFormat::Json,
      Some(other) => return Err(AppError::Config(format!("Invalid LOG_FORMAT '{}': expected text or json", other))),
    };
    let catalog_file = get_env("CATALOG_FILE").map(PathBuf::from);

    Ok(Self {
      storage_dir,
      storage_slot,
      mutation_ordering,
      log_format,
      catalog_file,
    })
  }

  pub fn cart_config(&self) -> CartConfig {
    CartConfig::default()
      .with_storage_slot(self.storage_slot.clone())
      .with_mutation_ordering(self.mutation_ordering)
  }
}
