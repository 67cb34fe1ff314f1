use super::availability::check_slot;
use super::{BookingEvent, BookingRequest, BookingRules, BookingState, StateCatalog};
use crate::error::{Error, Result};
use crate::model::{Booking, BookingId, Database, OfferedServiceId, UserId};
use crate::notification::{EventKind, Notice};
use chrono::NaiveDateTime;

/// Noms affichables des parties d'une réservation (pour les notifications).
struct Parties {
    worker: Option<UserId>,
    client_name: String,
    worker_name: String,
    service_name: String,
}

fn parties(db: &Database, booking: &Booking) -> Parties {
    let service = db.find_offered_service(booking.offered_service_id);
    let worker = service.and_then(|s| s.owner.worker());
    Parties {
        worker,
        client_name: db
            .find_user(booking.client_id)
            .map(|u| u.display_name())
            .unwrap_or_else(|| "Cliente".into()),
        worker_name: worker
            .and_then(|w| db.find_user(w))
            .map(|u| u.display_name())
            .unwrap_or_else(|| "Trabajador".into()),
        service_name: service
            .and_then(|s| db.find_service_type(s.service_type_id))
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "Servicio".into()),
    }
}

fn notice_for_client(booking: &Booking, parties: &Parties, kind: EventKind) -> Notice {
    Notice::new(booking.client_id, kind)
        .with("booking_id", booking.id.to_string())
        .with("trabajador_nombre", parties.worker_name.clone())
        .with("servicio_nombre", parties.service_name.clone())
}

fn notice_for_worker(worker: UserId, booking: &Booking, parties: &Parties, kind: EventKind) -> Notice {
    Notice::new(worker, kind)
        .with("booking_id", booking.id.to_string())
        .with("cliente_nombre", parties.client_name.clone())
        .with("servicio_nombre", parties.service_name.clone())
}

fn set_state(
    db: &mut Database,
    catalog: &StateCatalog,
    id: BookingId,
    next: BookingState,
    now: NaiveDateTime,
) -> Result<Booking> {
    let booking = db.find_booking_mut(id).ok_or(Error::UnknownBooking(id))?;
    booking.state_id = catalog.id_of(next);
    match next {
        BookingState::Confirmed => booking.confirmed_at = Some(now),
        BookingState::Completed => booking.fulfilled_at = Some(now),
        _ => {}
    }
    tracing::debug!(booking = %id, state = %next, "booking transition");
    Ok(booking.clone())
}

/// Crée une réservation à l'état `requested` si le créneau est libre.
pub fn create(
    db: &mut Database,
    catalog: &StateCatalog,
    rules: &BookingRules,
    client: UserId,
    request: BookingRequest,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    let service = db
        .find_offered_service(request.offered_service_id)
        .ok_or(Error::UnknownOfferedService(request.offered_service_id))?;
    let worker = service
        .owner
        .worker()
        .ok_or(Error::OrphanedService(service.id))?;
    if db.find_user(client).is_none() {
        return Err(Error::UnknownUser(client));
    }

    let check = check_slot(
        db,
        catalog,
        rules,
        request.offered_service_id,
        request.slot.date,
        request.slot.range,
        now,
    )?;
    if let Some(reason) = check.reason {
        return Err(Error::SlotUnavailable(reason));
    }

    let booking = Booking {
        id: db.next_booking_id(),
        client_id: client,
        offered_service_id: request.offered_service_id,
        state_id: catalog.id_of(BookingState::Requested),
        selected_slot: request.slot,
        observations: request.observations,
        requested_at: now,
        confirmed_at: None,
        fulfilled_at: None,
    };
    db.bookings.push(booking.clone());

    let parties = parties(db, &booking);
    let notice = notice_for_worker(worker, &booking, &parties, EventKind::BookingRequested);
    Ok((booking, vec![notice]))
}

/// Transition pilotée par le travailleur propriétaire du service.
fn worker_transition(
    db: &mut Database,
    catalog: &StateCatalog,
    worker: UserId,
    id: BookingId,
    event: BookingEvent,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    let booking = db.find_booking(id).ok_or(Error::UnknownBooking(id))?;
    let service = db
        .find_offered_service(booking.offered_service_id)
        .ok_or(Error::UnknownOfferedService(booking.offered_service_id))?;
    if !service.owner.is(worker) {
        return Err(Error::Unauthorized("booking belongs to another worker's service"));
    }
    let state = catalog.state_of(booking.state_id)?;
    let next = state.apply(event).ok_or(Error::InvalidTransition {
        booking: id,
        state,
        event,
    })?;

    let updated = set_state(db, catalog, id, next, now)?;
    let kind = match next {
        BookingState::Confirmed => EventKind::BookingConfirmed,
        BookingState::Rejected => EventKind::BookingRejected,
        BookingState::InProgress => EventKind::BookingStarted,
        _ => EventKind::BookingCompleted,
    };
    let parties = parties(db, &updated);
    let notice = notice_for_client(&updated, &parties, kind);
    Ok((updated, vec![notice]))
}

pub fn confirm(
    db: &mut Database,
    catalog: &StateCatalog,
    worker: UserId,
    id: BookingId,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    worker_transition(db, catalog, worker, id, BookingEvent::Confirm, now)
}

pub fn reject(
    db: &mut Database,
    catalog: &StateCatalog,
    worker: UserId,
    id: BookingId,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    worker_transition(db, catalog, worker, id, BookingEvent::Reject, now)
}

pub fn start(
    db: &mut Database,
    catalog: &StateCatalog,
    worker: UserId,
    id: BookingId,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    worker_transition(db, catalog, worker, id, BookingEvent::Start, now)
}

pub fn complete(
    db: &mut Database,
    catalog: &StateCatalog,
    worker: UserId,
    id: BookingId,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    worker_transition(db, catalog, worker, id, BookingEvent::Complete, now)
}

/// Annulation par le client : `requested` toujours, `confirmed` seulement avec préavis suffisant.
pub fn cancel_by_client(
    db: &mut Database,
    catalog: &StateCatalog,
    rules: &BookingRules,
    client: UserId,
    id: BookingId,
    now: NaiveDateTime,
) -> Result<(Booking, Vec<Notice>)> {
    let booking = db.find_booking(id).ok_or(Error::UnknownBooking(id))?;
    if booking.client_id != client {
        return Err(Error::Unauthorized("booking belongs to another client"));
    }
    let state = catalog.state_of(booking.state_id)?;
    if state == BookingState::Confirmed && now + rules.cancel_notice() > booking.selected_slot.starts_at() {
        return Err(Error::CancellationWindow {
            booking: id,
            notice_hours: rules.cancel_notice_hours,
        });
    }
    let next = state
        .apply(BookingEvent::Cancel)
        .ok_or(Error::InvalidTransition {
            booking: id,
            state,
            event: BookingEvent::Cancel,
        })?;

    let updated = set_state(db, catalog, id, next, now)?;
    let parties = parties(db, &updated);
    let notices = parties
        .worker
        .map(|worker| {
            notice_for_worker(worker, &updated, &parties, EventKind::BookingCancelledByClient)
        })
        .into_iter()
        .collect();
    Ok((updated, notices))
}

/// Annule toutes les réservations actives des services donnés (retrait du travailleur).
pub(crate) fn withdraw(
    db: &mut Database,
    catalog: &StateCatalog,
    services: &[OfferedServiceId],
    now: NaiveDateTime,
) -> Result<(Vec<BookingId>, Vec<Notice>)> {
    let mut active = Vec::new();
    for booking in db
        .bookings
        .iter()
        .filter(|b| services.contains(&b.offered_service_id))
    {
        if let Some(next) = catalog.state_of(booking.state_id)?.apply(BookingEvent::Withdraw) {
            active.push((booking.id, next));
        }
    }

    let mut notices = Vec::with_capacity(active.len());
    let mut cancelled = Vec::with_capacity(active.len());
    for (id, next) in active {
        let booking = set_state(db, catalog, id, next, now)?;
        cancelled.push(id);
        let parties = parties(db, &booking);
        notices.push(notice_for_client(
            &booking,
            &parties,
            EventKind::BookingCancelledByWorker,
        ));
    }
    Ok((cancelled, notices))
}
