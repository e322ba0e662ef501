// box_office/src/catalog.rs

use crate::errors::{AppError, Result};
use cartsync::{CompositeKey, TicketListing};
use std::path::Path;

const SEED_CATALOG: &str = r#"[
  {
    "eventId": "concert-1",
    "ticketType": "Full",
    "unitPrice": 5000,
    "eventName": "Midnight Strings",
    "eventImage": "https://img.example.com/concert-1.jpg",
    "eventDate": "2026-11-21T20:00:00Z",
    "eventLocation": "Main Hall"
  },
  {
    "eventId": "concert-1",
    "ticketType": "Half",
    "unitPrice": 2500,
    "eventName": "Midnight Strings",
    "eventImage": "https://img.example.com/concert-1.jpg",
    "eventDate": "2026-11-21T20:00:00Z",
    "eventLocation": "Main Hall"
  },
  {
    "eventId": "theatre-7",
    "ticketType": "VIP",
    "unitPrice": 12000,
    "eventName": "The Long Rehearsal",
    "eventImage": "https://img.example.com/theatre-7.jpg",
    "eventDate": "2026-12-05T19:30:00Z",
    "eventLocation": "Studio Theatre"
  }
]"#;

#[derive(Debug, Clone)]
pub struct Catalog {
  listings: Vec<TicketListing>,
}

impl Catalog {
  /// The built-in catalogue, or the listings in `file` when given.
  pub fn load(file: Option<&Path>) -> Result<Self> {
    let listings: Vec<TicketListing> = match file {
      Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
      None => serde_json::from_str(SEED_CATALOG)?,
    };
    tracing::info!(listings = listings.len(), "Catalogue loaded.");
    Ok(Self { listings })
  }

  pub fn listings(&self) -> &[TicketListing] {
    &self.listings
  }

  pub fn get(&self, event_id: &str, ticket_type: &str) -> Result<TicketListing> {
    let key = CompositeKey::new(event_id, ticket_type);
    self
      .listings
      .iter()
      .find(|listing| listing.key() == key)
      .cloned()
      .ok_or_else(|| AppError::NotFound(key.to_string()))
  }
}
