#![forbid(unsafe_code)]
//! Reserva : moteur de réservation d'une place de marché de services.
//!
//! - Horaires hebdomadaires par service offert (JSON), détection de chevauchements
//!   entre les services d'un même travailleur.
//! - Vérification de disponibilité d'un créneau face aux réservations bloquantes.
//! - Cycle de vie des réservations, notes, retrait de travailleur.
//! - Heures locales naïves (`HH:MM`, `YYYY-MM-DD`) ; l'horloge est fournie par l'appelant.

pub mod booking;
pub mod error;
pub mod identity;
pub mod io;
pub mod marketplace;
pub mod model;
pub mod notification;
pub mod offering;
pub mod rating;
pub mod schedule;
pub mod storage;

pub use booking::{BookingEvent, BookingRequest, BookingRules, BookingState, SlotCheck, SlotRejection, StateCatalog};
pub use error::{Error, ErrorKind, Result};
pub use identity::{IdentityError, IdentityResolver, TokenTable};
pub use marketplace::Marketplace;
pub use model::{
    Booking, BookingId, BookingSlot, Database, OfferedService, OfferedServiceId, Owner, Rating, ServiceTypeId,
    UserId,
};
pub use notification::{EventKind, LogNotifier, MemoryNotifier, Notice, NoticeRenderer, Notifier, OutboxNotifier, TextNotice};
pub use offering::{NewOfferedService, Retirement, ServicePatch};
pub use schedule::{ScheduleConflict, TimeRange, ValidationOutcome, Weekday, WeeklySchedule};
pub use storage::{JsonStorage, MemoryStorage, Storage};
