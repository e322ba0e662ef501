// cartsync/src/adapters/local.rs

//! Device-local persistence of the guest cart.
//!
//! `LocalStorage` is the raw slot store (a browser's local storage, a file
//! per slot, or memory). `LocalCartAdapter` sits on top of it and owns the
//! guest-cart semantics: whole-cart overwrites, and self-healing on corrupt
//! data. The adapter never reports a failure to its callers.

use crate::error::CartError;
use crate::model::Cart;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{event, Level};

/// Named string slots in durable device-local storage.
pub trait LocalStorage: Send + Sync {
  fn read_slot(&self, slot: &str) -> io::Result<Option<String>>;
  fn write_slot(&self, slot: &str, value: &str) -> io::Result<()>;
  fn remove_slot(&self, slot: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
  slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Raw slot contents, for inspecting what was persisted.
  pub fn raw(&self, slot: &str) -> Option<String> {
    self.slots.lock().get(slot).cloned()
  }
}

impl LocalStorage for MemoryStorage {
  fn read_slot(&self, slot: &str) -> io::Result<Option<String>> {
    Ok(self.slots.lock().get(slot).cloned())
  }

  fn write_slot(&self, slot: &str, value: &str) -> io::Result<()> {
    self.slots.lock().insert(slot.to_string(), value.to_string());
    Ok(())
  }

  fn remove_slot(&self, slot: &str) -> io::Result<()> {
    self.slots.lock().remove(slot);
    Ok(())
  }
}

/// One `<slot>.json` file per slot inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn slot_path(&self, slot: &str) -> PathBuf {
    self.dir.join(format!("{}.json", slot))
  }
}

impl LocalStorage for FileStorage {
  fn read_slot(&self, slot: &str) -> io::Result<Option<String>> {
    match std::fs::read_to_string(self.slot_path(slot)) {
      Ok(contents) => Ok(Some(contents)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  fn write_slot(&self, slot: &str, value: &str) -> io::Result<()> {
    std::fs::create_dir_all(&self.dir)?;
    // Write-then-rename so a crash never leaves a half-written cart behind.
    let tmp_path = self.dir.join(format!("{}.json.tmp", slot));
    std::fs::write(&tmp_path, value)?;
    std::fs::rename(&tmp_path, self.slot_path(slot))
  }

  fn remove_slot(&self, slot: &str) -> io::Result<()> {
    match std::fs::remove_file(self.slot_path(slot)) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
      _ => Ok(()),
    }
  }
}

#[derive(Clone)]
pub struct LocalCartAdapter {
  storage: Arc<dyn LocalStorage>,
  slot: String,
}

impl LocalCartAdapter {
  pub fn new(storage: Arc<dyn LocalStorage>, slot: impl Into<String>) -> Self {
    Self {
      storage,
      slot: slot.into(),
    }
  }

  pub fn slot(&self) -> &str {
    &self.slot
  }

  /// The persisted guest cart, or an empty cart when the slot is absent,
  /// unreadable or corrupt. Corrupt contents are wiped.
  pub fn load(&self) -> Cart {
    let raw = match self.storage.read_slot(&self.slot) {
      Ok(Some(raw)) => raw,
      Ok(None) => return Cart::new(),
      Err(e) => {
        event!(Level::WARN, slot = %self.slot, error = %e, "Guest cart unreadable, using an empty cart.");
        return Cart::new();
      }
    };

    match Self::decode(&raw) {
      Ok(cart) => cart,
      Err(e) => {
        event!(Level::WARN, slot = %self.slot, error = %e, "Discarding corrupt guest cart.");
        self.clear();
        Cart::new()
      }
    }
  }

  /// Overwrites the whole stored cart. An empty cart removes the slot.
  pub fn save(&self, cart: &Cart) {
    if cart.is_empty() {
      self.clear();
      return;
    }
    let encoded = match serde_json::to_string(cart) {
      Ok(encoded) => encoded,
      Err(e) => {
        event!(Level::ERROR, slot = %self.slot, error = %e, "Failed to encode guest cart.");
        return;
      }
    };
    if let Err(e) = self.storage.write_slot(&self.slot, &encoded) {
      event!(Level::WARN, slot = %self.slot, error = %e, "Failed to persist guest cart.");
    } else {
      event!(Level::TRACE, slot = %self.slot, lines = cart.len(), "Guest cart persisted.");
    }
  }

  pub fn clear(&self) {
    if let Err(e) = self.storage.remove_slot(&self.slot) {
      event!(Level::WARN, slot = %self.slot, error = %e, "Failed to clear guest cart.");
    }
  }

  fn decode(raw: &str) -> Result<Cart, CartError> {
    // Deserializing a `Cart` also checks its invariants.
    serde_json::from_str(raw).map_err(|e| CartError::LocalStoreCorrupt { reason: e.to_string() })
  }
}

impl std::fmt::Debug for LocalCartAdapter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalCartAdapter").field("slot", &self.slot).finish()
  }
}
