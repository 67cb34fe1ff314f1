use crate::booking::{BookingEvent, BookingState, SlotRejection};
use crate::identity::IdentityError;
use crate::model::{BookingId, OfferedServiceId, ServiceTypeId, StateId, UserId};
use crate::schedule::{ScheduleConflict, TimeError};
use thiserror::Error;

/// Famille d'erreur visible par l'appelant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Conflict,
    State,
    StorageCorrupt,
    Storage,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error("malformed schedule document: {0}")]
    MalformedSchedule(#[source] serde_json::Error),
    #[error("stored schedule of offered service {offered_service} is corrupt: {source}")]
    ScheduleCorrupt {
        offered_service: OfferedServiceId,
        #[source]
        source: serde_json::Error,
    },
    #[error("schedule conflict: {0}")]
    ScheduleConflict(ScheduleConflict),
    #[error("slot unavailable: {0}")]
    SlotUnavailable(SlotRejection),
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
    #[error("unknown service type: {0}")]
    UnknownServiceType(ServiceTypeId),
    #[error("unknown offered service: {0}")]
    UnknownOfferedService(OfferedServiceId),
    #[error("offered service {0} is no longer offered")]
    OrphanedService(OfferedServiceId),
    #[error("unknown booking: {0}")]
    UnknownBooking(BookingId),
    #[error("not authorized: {0}")]
    Unauthorized(&'static str),
    #[error("cannot {event} booking {booking} in state '{state}'")]
    InvalidTransition {
        booking: BookingId,
        state: BookingState,
        event: BookingEvent,
    },
    #[error("booking {booking} is too close to its start time to be cancelled (less than {notice_hours}h notice)")]
    CancellationWindow { booking: BookingId, notice_hours: i64 },
    #[error("score must be between {min} and {max}, got {score}")]
    InvalidScore { score: u8, min: u8, max: u8 },
    #[error("booking {0} has already been rated")]
    AlreadyRated(BookingId),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("booking state catalog: {0}")]
    StateCatalog(String),
    #[error("unknown booking state id: {0}")]
    UnknownStateId(StateId),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Time(_) | Error::MalformedSchedule(_) | Error::InvalidScore { .. } => {
                ErrorKind::Validation
            }
            Error::SlotUnavailable(rejection) => match rejection {
                SlotRejection::Overlap { .. } => ErrorKind::Conflict,
                SlotRejection::TooSoon { .. } | SlotRejection::Invalid(_) => ErrorKind::Validation,
            },
            Error::ScheduleConflict(_) | Error::AlreadyRated(_) => ErrorKind::Conflict,
            Error::UnknownUser(_)
            | Error::UnknownServiceType(_)
            | Error::UnknownOfferedService(_)
            | Error::OrphanedService(_)
            | Error::UnknownBooking(_) => ErrorKind::NotFound,
            Error::Unauthorized(_) | Error::Identity(_) => ErrorKind::Authorization,
            Error::InvalidTransition { .. } | Error::CancellationWindow { .. } => ErrorKind::State,
            Error::ScheduleCorrupt { .. } | Error::StateCatalog(_) | Error::UnknownStateId(_) => {
                ErrorKind::StorageCorrupt
            }
            Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
