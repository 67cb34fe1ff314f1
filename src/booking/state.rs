use crate::error::{Error, Result};
use crate::model::{StateId, StateRow};
use std::collections::BTreeMap;
use std::fmt;

/// États d'une réservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BookingState {
    Requested,
    Confirmed,
    Rejected,
    InProgress,
    Completed,
    CancelledByClient,
    CancelledByWorker,
}

/// Événements qui font avancer une réservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Confirm,
    Reject,
    Start,
    Complete,
    Cancel,
    /// Annulation imposée par le retrait du travailleur
    Withdraw,
    Rate,
}

impl BookingState {
    /// Ordre canonique du catalogue (détermine les ids à l'amorçage).
    pub const ALL: [BookingState; 7] = [
        BookingState::Requested,
        BookingState::Confirmed,
        BookingState::Rejected,
        BookingState::InProgress,
        BookingState::Completed,
        BookingState::CancelledByClient,
        BookingState::CancelledByWorker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BookingState::Requested => "requested",
            BookingState::Confirmed => "confirmed",
            BookingState::Rejected => "rejected",
            BookingState::InProgress => "in_progress",
            BookingState::Completed => "completed",
            BookingState::CancelledByClient => "cancelled_by_client",
            BookingState::CancelledByWorker => "cancelled_by_worker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Occupe le créneau : requested, confirmed, in_progress.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            BookingState::Requested | BookingState::Confirmed | BookingState::InProgress
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_blocking()
    }

    /// Table de transition ; `None` si l'événement est interdit depuis cet état.
    pub fn apply(self, event: BookingEvent) -> Option<BookingState> {
        use BookingEvent as E;
        use BookingState as S;
        match (self, event) {
            (S::Requested, E::Confirm) => Some(S::Confirmed),
            (S::Requested, E::Reject) => Some(S::Rejected),
            (S::Confirmed, E::Start) => Some(S::InProgress),
            (S::InProgress, E::Complete) => Some(S::Completed),
            (S::Requested | S::Confirmed, E::Cancel) => Some(S::CancelledByClient),
            (s, E::Withdraw) if !s.is_terminal() => Some(S::CancelledByWorker),
            _ => None,
        }
    }
}

impl fmt::Display for BookingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            BookingEvent::Confirm => "confirm",
            BookingEvent::Reject => "reject",
            BookingEvent::Start => "start",
            BookingEvent::Complete => "complete",
            BookingEvent::Cancel => "cancel",
            BookingEvent::Withdraw => "withdraw",
            BookingEvent::Rate => "rate",
        };
        f.write_str(verb)
    }
}

/// Correspondance état ↔ id numérique, résolue une fois au démarrage par nom.
#[derive(Debug, Clone)]
pub struct StateCatalog {
    ids: BTreeMap<BookingState, StateId>,
    states: BTreeMap<StateId, BookingState>,
}

impl StateCatalog {
    pub fn resolve(rows: &[StateRow]) -> Result<Self> {
        let mut ids = BTreeMap::new();
        let mut states = BTreeMap::new();
        for row in rows {
            let state = BookingState::from_name(&row.name)
                .ok_or_else(|| Error::StateCatalog(format!("unknown state name '{}'", row.name)))?;
            if ids.insert(state, row.id).is_some() {
                return Err(Error::StateCatalog(format!("duplicate state '{}'", row.name)));
            }
            if states.insert(row.id, state).is_some() {
                return Err(Error::StateCatalog(format!("duplicate state id {}", row.id)));
            }
        }
        if let Some(missing) = BookingState::ALL.into_iter().find(|s| !ids.contains_key(s)) {
            return Err(Error::StateCatalog(format!("missing state '{missing}'")));
        }

        let catalog = Self { ids, states };
        let blocking = catalog.blocking_ids();
        let excluded = catalog.non_blocking_ids();
        if blocking.iter().any(|id| excluded.contains(id))
            || blocking.len() + excluded.len() != catalog.states.len()
        {
            return Err(Error::StateCatalog(
                "blocking and non-blocking id sets do not partition the catalog".to_string(),
            ));
        }
        Ok(catalog)
    }

    pub fn id_of(&self, state: BookingState) -> StateId {
        // resolve() garantit que les 7 états sont présents
        self.ids[&state]
    }

    pub fn state_of(&self, id: StateId) -> Result<BookingState> {
        self.states
            .get(&id)
            .copied()
            .ok_or(Error::UnknownStateId(id))
    }

    pub fn blocking_ids(&self) -> Vec<StateId> {
        self.ids_where(BookingState::is_blocking)
    }

    /// Ids écartés d'emblée par la requête « réservations du jour ».
    pub fn non_blocking_ids(&self) -> Vec<StateId> {
        self.ids_where(|s| !s.is_blocking())
    }

    fn ids_where(&self, pred: impl Fn(BookingState) -> bool) -> Vec<StateId> {
        self.ids
            .iter()
            .filter(|(state, _)| pred(**state))
            .map(|(_, id)| *id)
            .collect()
    }
}
