//! Cycle de vie des réservations : disponibilité des créneaux et transitions d'état.

pub mod availability;
pub mod queries;
mod state;
pub mod transitions;
mod types;

pub use state::{BookingEvent, BookingState, StateCatalog};
pub use types::{BookingRequest, BookingRules, SlotCheck, SlotRejection};
