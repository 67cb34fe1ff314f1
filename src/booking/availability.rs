use super::{BookingRules, SlotCheck, SlotRejection, StateCatalog};
use crate::error::Result;
use crate::model::{Database, OfferedServiceId};
use crate::schedule::{parse_date, ClockTime, TimeRange};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;

/// Vérifie qu'un créneau est libre pour un service à une date.
///
/// Le créneau doit commencer au moins `rules.min_lead_minutes` après `now`, puis ne
/// chevaucher aucune réservation dans un état bloquant.
pub fn check_slot(
    db: &Database,
    catalog: &StateCatalog,
    rules: &BookingRules,
    offered_service: OfferedServiceId,
    date: NaiveDate,
    candidate: TimeRange,
    now: NaiveDateTime,
) -> Result<SlotCheck> {
    let starts_at = date.and_time(candidate.start().to_naive_time());
    let earliest = now + rules.min_lead();
    if starts_at < earliest {
        return Ok(SlotCheck::taken(SlotRejection::TooSoon { earliest }));
    }

    let excluded = catalog.non_blocking_ids();
    for booking in db.bookings_on(offered_service, date, &excluded) {
        if !catalog.state_of(booking.state_id)?.is_blocking() {
            continue;
        }
        let existing = booking.selected_slot.range;
        if candidate.overlaps(&existing) {
            return Ok(SlotCheck::taken(SlotRejection::Overlap {
                booking: booking.id,
                existing,
            }));
        }
    }
    Ok(SlotCheck::free())
}

/// Variante pour des entrées brutes : un format invalide est un refus, pas une erreur.
#[allow(clippy::too_many_arguments)]
pub fn check_slot_raw(
    db: &Database,
    catalog: &StateCatalog,
    rules: &BookingRules,
    offered_service: OfferedServiceId,
    date: &str,
    start: &str,
    end: &str,
    now: NaiveDateTime,
) -> Result<SlotCheck> {
    let parsed = parse_date(date).and_then(|d| TimeRange::parse(start, end).map(|r| (d, r)));
    match parsed {
        Ok((date, candidate)) => check_slot(db, catalog, rules, offered_service, date, candidate, now),
        Err(err) => Ok(SlotCheck::taken(SlotRejection::Invalid(err))),
    }
}

/// Heures de début déjà prises (triées, sans doublon) par des réservations bloquantes.
pub fn occupied_start_times(
    db: &Database,
    catalog: &StateCatalog,
    offered_service: OfferedServiceId,
    date: NaiveDate,
) -> Result<Vec<ClockTime>> {
    let excluded = catalog.non_blocking_ids();
    let mut taken = BTreeSet::new();
    for booking in db.bookings_on(offered_service, date, &excluded) {
        if catalog.state_of(booking.state_id)?.is_blocking() {
            taken.insert(booking.selected_slot.range.start());
        }
    }
    Ok(taken.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingState;
    use crate::model::{Booking, BookingId, BookingSlot, UserId};

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
    }

    fn push(db: &mut Database, catalog: &StateCatalog, start: &str, end: &str, state: BookingState) {
        let id = db.next_booking_id();
        db.bookings.push(Booking {
            id,
            client_id: UserId::new(1),
            offered_service_id: OfferedServiceId::new(10),
            state_id: catalog.id_of(state),
            selected_slot: BookingSlot::parse("2025-06-03", start, end).unwrap(),
            observations: None,
            requested_at: at("2025-05-01 08:00"),
            confirmed_at: None,
            fulfilled_at: None,
        });
    }

    fn fixture() -> (Database, StateCatalog) {
        let db = Database::seeded();
        let catalog = StateCatalog::resolve(&db.booking_states).unwrap();
        (db, catalog)
    }

    fn check(db: &Database, catalog: &StateCatalog, start: &str, end: &str, now: &str) -> SlotCheck {
        check_slot_raw(
            db,
            catalog,
            &BookingRules::default(),
            OfferedServiceId::new(10),
            "2025-06-03",
            start,
            end,
            at(now),
        )
        .unwrap()
    }

    #[test]
    fn blocking_booking_takes_the_slot() {
        let (mut db, catalog) = fixture();
        push(&mut db, &catalog, "14:00", "15:00", BookingState::Requested);

        let result = check(&db, &catalog, "14:30", "15:30", "2025-06-01 10:00");
        assert!(!result.available);
        assert_eq!(
            result.reason,
            Some(SlotRejection::Overlap {
                booking: BookingId::new(1),
                existing: TimeRange::parse("14:00", "15:00").unwrap(),
            })
        );
        assert!(check(&db, &catalog, "15:00", "16:00", "2025-06-01 10:00").available);
    }

    #[test]
    fn cancelled_and_rejected_bookings_do_not_block() {
        let (mut db, catalog) = fixture();
        push(&mut db, &catalog, "14:00", "15:00", BookingState::CancelledByClient);
        push(&mut db, &catalog, "14:00", "15:00", BookingState::Rejected);
        push(&mut db, &catalog, "14:00", "15:00", BookingState::Completed);
        assert!(check(&db, &catalog, "14:00", "15:00", "2025-06-01 10:00").available);
    }

    #[test]
    fn other_dates_and_services_are_ignored() {
        let (mut db, catalog) = fixture();
        push(&mut db, &catalog, "14:00", "15:00", BookingState::Confirmed);
        db.bookings[0].offered_service_id = OfferedServiceId::new(11);
        assert!(check(&db, &catalog, "14:00", "15:00", "2025-06-01 10:00").available);
    }

    #[test]
    fn lead_time_is_enforced() {
        let (db, catalog) = fixture();
        let result = check(&db, &catalog, "14:00", "15:00", "2025-06-03 13:31");
        assert!(matches!(result.reason, Some(SlotRejection::TooSoon { .. })));
        assert!(check(&db, &catalog, "14:00", "15:00", "2025-06-03 13:30").available);
        assert!(!check(&db, &catalog, "14:00", "15:00", "2025-06-04 09:00").available);
    }

    #[test]
    fn bad_input_is_a_rejection() {
        let (db, catalog) = fixture();
        let result = check(&db, &catalog, "2pm", "15:00", "2025-06-01 10:00");
        assert!(matches!(result.reason, Some(SlotRejection::Invalid(_))));
    }

    #[test]
    fn occupied_hours_only_count_blocking_states() {
        let (mut db, catalog) = fixture();
        push(&mut db, &catalog, "10:00", "11:00", BookingState::Requested);
        push(&mut db, &catalog, "11:00", "12:00", BookingState::CancelledByClient);
        push(&mut db, &catalog, "10:00", "10:30", BookingState::InProgress);
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let hours: Vec<String> = occupied_start_times(&db, &catalog, OfferedServiceId::new(10), date)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(hours, vec!["10:00".to_string()]);
    }
}
