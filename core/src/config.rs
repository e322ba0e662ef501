// cartsync/src/config.rs

//! Session-level knobs for the cart core.

/// How authenticated-mode mutations are allowed to interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationOrdering {
  /// Mutations may overlap at the network boundary. Each one re-fetches the
  /// remote cart when it finishes, so whichever response resolves last is the
  /// snapshot that stays visible (last-write-visible, not last-issued-wins).
  #[default]
  Overlapping,
  /// At most one mutation is in flight per session; later calls wait for the
  /// earlier ones to finish before touching the remote cart.
  Sequenced,
}

impl std::str::FromStr for MutationOrdering {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "overlapping" => Ok(MutationOrdering::Overlapping),
      "sequenced" => Ok(MutationOrdering::Sequenced),
      other => Err(format!("unknown mutation ordering '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
  /// Name of the device-local storage slot that holds the guest cart.
  pub storage_slot: String,
  pub mutation_ordering: MutationOrdering,
}

pub const DEFAULT_STORAGE_SLOT: &str = "cart";

impl Default for CartConfig {
  fn default() -> Self {
    Self {
      storage_slot: DEFAULT_STORAGE_SLOT.to_string(),
      mutation_ordering: MutationOrdering::default(),
    }
  }
}

impl CartConfig {
  pub fn with_storage_slot(mut self, slot: impl Into<String>) -> Self {
    self.storage_slot = slot.into();
    self
  }

  pub fn with_mutation_ordering(mut self, ordering: MutationOrdering) -> Self {
    self.mutation_ordering = ordering;
    self
  }
}
