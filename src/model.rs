use crate::booking::BookingState;
use crate::schedule::{parse_date, TimeError, TimeRange, Weekday};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

row_id!(
    /// Identifiant d'un utilisateur (client ou travailleur)
    UserId
);
row_id!(
    /// Identifiant d'un type de service du catalogue générique
    ServiceTypeId
);
row_id!(
    /// Identifiant d'un service offert par un travailleur
    OfferedServiceId
);
row_id!(BookingId);
row_id!(
    /// Identifiant numérique d'état attribué par le stockage (ordre d'insertion)
    StateId
);
row_id!(RatingId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Travailleur retiré : ses services sont orphelins
    #[serde(default)]
    pub retired: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub name: String,
}

/// Propriétaire d'un service offert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "worker_id", rename_all = "snake_case")]
pub enum Owner {
    Worker(UserId),
    /// Le travailleur a été retiré ; le service n'apparaît plus nulle part.
    Orphaned,
}

impl Owner {
    pub fn worker(self) -> Option<UserId> {
        match self {
            Owner::Worker(id) => Some(id),
            Owner::Orphaned => None,
        }
    }

    pub fn is(self, worker: UserId) -> bool {
        self.worker() == Some(worker)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferedService {
    pub id: OfferedServiceId,
    pub owner: Owner,
    pub service_type_id: ServiceTypeId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub hourly_price: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Horaire stocké en texte JSON brut, tel que persisté.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub offered_service_id: OfferedServiceId,
    pub horario_json: String,
}

/// Ligne du catalogue d'états (nom → id numérique).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRow {
    pub id: StateId,
    pub name: String,
}

/// Créneau choisi par le client ; immuable après création.
///
/// Format JSON : `{"fecha", "dia_semana", "hora_inicio", "hora_fin", "duracion_estimada_minutos"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SlotWire", into = "SlotWire")]
pub struct BookingSlot {
    pub date: NaiveDate,
    pub weekday: String,
    pub range: TimeRange,
    pub duration_minutes: u32,
}

#[derive(Serialize, Deserialize)]
struct SlotWire {
    fecha: NaiveDate,
    dia_semana: String,
    hora_inicio: crate::schedule::ClockTime,
    hora_fin: crate::schedule::ClockTime,
    duracion_estimada_minutos: u32,
}

impl TryFrom<SlotWire> for BookingSlot {
    type Error = TimeError;

    fn try_from(wire: SlotWire) -> Result<Self, Self::Error> {
        Ok(Self {
            date: wire.fecha,
            weekday: wire.dia_semana,
            range: TimeRange::new(wire.hora_inicio, wire.hora_fin)?,
            duration_minutes: wire.duracion_estimada_minutos,
        })
    }
}

impl From<BookingSlot> for SlotWire {
    fn from(slot: BookingSlot) -> Self {
        Self {
            fecha: slot.date,
            dia_semana: slot.weekday,
            hora_inicio: slot.range.start(),
            hora_fin: slot.range.end(),
            duracion_estimada_minutos: slot.duration_minutes,
        }
    }
}

impl BookingSlot {
    /// Construit un créneau depuis ses chaînes ; jour et durée sont déduits.
    pub fn parse(date: &str, start: &str, end: &str) -> Result<Self, TimeError> {
        let date = parse_date(date)?;
        let range = TimeRange::parse(start, end)?;
        Ok(Self {
            date,
            weekday: Weekday::of_date(date).key().to_string(),
            range,
            duration_minutes: u32::from(range.duration_minutes()),
        })
    }

    /// Instant de début (date + heure de début).
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.range.start().to_naive_time())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub client_id: UserId,
    pub offered_service_id: OfferedServiceId,
    pub state_id: StateId,
    pub selected_slot: BookingSlot,
    #[serde(default)]
    pub observations: Option<String>,
    pub requested_at: NaiveDateTime,
    #[serde(default)]
    pub confirmed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub fulfilled_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub booking_id: BookingId,
    pub client_id: UserId,
    pub worker: Owner,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Base complète : tables de lignes adressables par id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub service_types: Vec<ServiceType>,
    #[serde(default)]
    pub offered_services: Vec<OfferedService>,
    #[serde(default)]
    pub schedules: Vec<ScheduleRow>,
    #[serde(default)]
    pub booking_states: Vec<StateRow>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

impl Database {
    /// Base vide avec le catalogue d'états inséré dans l'ordre canonique.
    pub fn seeded() -> Self {
        let mut db = Self::default();
        db.seed_states();
        db
    }

    /// Insère les états manquants, sans toucher aux ids existants.
    pub fn seed_states(&mut self) {
        for state in BookingState::ALL {
            if self.booking_states.iter().any(|row| row.name == state.name()) {
                continue;
            }
            let id = StateId::new(next_id(self.booking_states.iter().map(|r| r.id.get())));
            self.booking_states.push(StateRow {
                id,
                name: state.name().to_string(),
            });
        }
    }

    pub fn add_user<F: Into<String>, L: Into<String>>(
        &mut self,
        first_name: F,
        last_name: L,
        email: Option<String>,
    ) -> UserId {
        let id = UserId::new(next_id(self.users.iter().map(|u| u.id.get())));
        self.users.push(User {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email,
            retired: false,
        });
        id
    }

    pub fn add_service_type<N: Into<String>>(&mut self, name: N) -> ServiceTypeId {
        let id = ServiceTypeId::new(next_id(self.service_types.iter().map(|t| t.id.get())));
        self.service_types.push(ServiceType {
            id,
            name: name.into(),
        });
        id
    }

    pub fn find_user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
    pub fn find_user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
    pub fn find_service_type(&self, id: ServiceTypeId) -> Option<&ServiceType> {
        self.service_types.iter().find(|t| t.id == id)
    }
    pub fn find_offered_service(&self, id: OfferedServiceId) -> Option<&OfferedService> {
        self.offered_services.iter().find(|s| s.id == id)
    }
    pub fn find_offered_service_mut(&mut self, id: OfferedServiceId) -> Option<&mut OfferedService> {
        self.offered_services.iter_mut().find(|s| s.id == id)
    }
    pub fn find_booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }
    pub fn find_booking_mut(&mut self, id: BookingId) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub(crate) fn next_offered_service_id(&self) -> OfferedServiceId {
        OfferedServiceId::new(next_id(self.offered_services.iter().map(|s| s.id.get())))
    }
    pub(crate) fn next_booking_id(&self) -> BookingId {
        BookingId::new(next_id(self.bookings.iter().map(|b| b.id.get())))
    }
    pub(crate) fn next_rating_id(&self) -> RatingId {
        RatingId::new(next_id(self.ratings.iter().map(|r| r.id.get())))
    }

    /// Services offerts par un travailleur.
    pub fn services_of(&self, worker: UserId) -> impl Iterator<Item = &OfferedService> + '_ {
        self.offered_services
            .iter()
            .filter(move |s| s.owner.is(worker))
    }

    /// Réservations d'un service pour une date, hors états exclus.
    pub fn bookings_on<'a>(
        &'a self,
        offered_service: OfferedServiceId,
        date: NaiveDate,
        excluding: &'a [StateId],
    ) -> impl Iterator<Item = &'a Booking> + 'a {
        self.bookings.iter().filter(move |b| {
            b.offered_service_id == offered_service
                && b.selected_slot.date == date
                && !excluding.contains(&b.state_id)
        })
    }
}
