use crate::model::{BookingId, BookingSlot, OfferedServiceId};
use crate::schedule::{TimeError, TimeRange};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Règles métier de réservation
#[derive(Debug, Clone, Copy)]
pub struct BookingRules {
    /// Délai minimal entre maintenant et le début d'un créneau réservé
    pub min_lead_minutes: i64,
    /// Préavis minimal pour qu'un client annule une réservation confirmée
    pub cancel_notice_hours: i64,
    pub min_score: u8,
    pub max_score: u8,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            min_lead_minutes: 30,
            cancel_notice_hours: 48,
            min_score: 1,
            max_score: 5,
        }
    }
}

impl BookingRules {
    pub fn min_lead(&self) -> Duration {
        Duration::minutes(self.min_lead_minutes)
    }

    pub fn cancel_notice(&self) -> Duration {
        Duration::hours(self.cancel_notice_hours)
    }
}

/// Demande de réservation envoyée par un client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    #[serde(rename = "servicio_disponible_id")]
    pub offered_service_id: OfferedServiceId,
    #[serde(rename = "horario_seleccionado")]
    pub slot: BookingSlot,
    #[serde(default, rename = "observaciones")]
    pub observations: Option<String>,
}

/// Raison pour laquelle un créneau n'est pas réservable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRejection {
    Invalid(TimeError),
    /// Début passé ou trop proche
    TooSoon { earliest: NaiveDateTime },
    Overlap { booking: BookingId, existing: TimeRange },
}

impl fmt::Display for SlotRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRejection::Invalid(err) => write!(f, "{err}"),
            SlotRejection::TooSoon { earliest } => write!(
                f,
                "slot is in the past or too soon (earliest start: {})",
                earliest.format("%Y-%m-%d %H:%M")
            ),
            SlotRejection::Overlap { booking, existing } => {
                write!(f, "overlaps booking {booking} ({existing})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCheck {
    pub available: bool,
    pub reason: Option<SlotRejection>,
}

impl SlotCheck {
    pub fn free() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn taken(reason: SlotRejection) -> Self {
        Self {
            available: false,
            reason: Some(reason),
        }
    }
}
