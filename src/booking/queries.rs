use super::{BookingState, StateCatalog};
use crate::error::Result;
use crate::model::{Booking, Database, UserId};

fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
    bookings
}

/// Toutes les réservations portant sur les services du travailleur.
pub fn for_worker(db: &Database, worker: UserId) -> Vec<Booking> {
    let services: Vec<_> = db.services_of(worker).map(|s| s.id).collect();
    newest_first(
        db.bookings
            .iter()
            .filter(|b| services.contains(&b.offered_service_id))
            .cloned()
            .collect(),
    )
}

/// Demandes en attente de réponse du travailleur.
pub fn pending_for_worker(db: &Database, catalog: &StateCatalog, worker: UserId) -> Vec<Booking> {
    let requested = catalog.id_of(BookingState::Requested);
    for_worker(db, worker)
        .into_iter()
        .filter(|b| b.state_id == requested)
        .collect()
}

pub fn for_client(db: &Database, client: UserId) -> Vec<Booking> {
    newest_first(
        db.bookings
            .iter()
            .filter(|b| b.client_id == client)
            .cloned()
            .collect(),
    )
}

/// Vue « état lisible » d'une liste de réservations.
pub fn with_states(catalog: &StateCatalog, bookings: Vec<Booking>) -> Result<Vec<(Booking, BookingState)>> {
    bookings
        .into_iter()
        .map(|b| catalog.state_of(b.state_id).map(|s| (b, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingId, BookingSlot, OfferedService, OfferedServiceId, Owner, ServiceTypeId};
    use chrono::NaiveDateTime;

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn worker_and_client_views() {
        let mut db = Database::seeded();
        let catalog = StateCatalog::resolve(&db.booking_states).unwrap();
        let worker = UserId::new(2);
        db.offered_services.push(OfferedService {
            id: OfferedServiceId::new(1),
            owner: Owner::Worker(worker),
            service_type_id: ServiceTypeId::new(1),
            description: None,
            observations: None,
            hourly_price: None,
            created_at: at("2025-01-01 00:00"),
            updated_at: at("2025-01-01 00:00"),
            images: Vec::new(),
        });
        for (raw, requested_at, state) in [
            (1, "2025-05-01 08:00", BookingState::Requested),
            (2, "2025-05-02 08:00", BookingState::Confirmed),
            (3, "2025-05-03 08:00", BookingState::Requested),
        ] {
            db.bookings.push(Booking {
                id: BookingId::new(raw),
                client_id: UserId::new(1),
                offered_service_id: OfferedServiceId::new(1),
                state_id: catalog.id_of(state),
                selected_slot: BookingSlot::parse("2025-06-03", "09:00", "10:00").unwrap(),
                observations: None,
                requested_at: at(requested_at),
                confirmed_at: None,
                fulfilled_at: None,
            });
        }

        let pending: Vec<i64> = pending_for_worker(&db, &catalog, worker)
            .iter()
            .map(|b| b.id.get())
            .collect();
        assert_eq!(pending, vec![3, 1]);
        assert_eq!(for_worker(&db, worker).len(), 3);
        assert!(for_worker(&db, UserId::new(1)).is_empty());

        let mine = with_states(&catalog, for_client(&db, UserId::new(1))).unwrap();
        assert_eq!(mine[1].1, BookingState::Confirmed);
    }
}
