//! Database entities for the card stock ledger.
//!
//! Catalog rows (`bank`, `location`, `card_type`) are reference data, `stock`
//! holds the per-location counters and `movement` is the append-only ledger.
//! `user` and `report` belong to collaborators; the ledger only reads them.

pub mod bank;
pub mod card_type;
pub mod location;
pub mod movement;
pub mod report;
pub mod stock;
pub mod user;

pub use movement::MovementType;
