use crate::booking::{BookingEvent, BookingRules, BookingState, StateCatalog};
use crate::error::{Error, Result};
use crate::model::{BookingId, Database, Owner, Rating, UserId};
use chrono::NaiveDateTime;

/// Note une réservation terminée. Une seule note par réservation.
#[allow(clippy::too_many_arguments)]
pub fn rate(
    db: &mut Database,
    catalog: &StateCatalog,
    rules: &BookingRules,
    client: UserId,
    booking_id: BookingId,
    score: u8,
    comment: Option<String>,
    now: NaiveDateTime,
) -> Result<Rating> {
    let booking = db
        .find_booking(booking_id)
        .ok_or(Error::UnknownBooking(booking_id))?;
    if booking.client_id != client {
        return Err(Error::Unauthorized("booking belongs to another client"));
    }
    let state = catalog.state_of(booking.state_id)?;
    if state != BookingState::Completed {
        return Err(Error::InvalidTransition {
            booking: booking_id,
            state,
            event: BookingEvent::Rate,
        });
    }
    if db.ratings.iter().any(|r| r.booking_id == booking_id) {
        return Err(Error::AlreadyRated(booking_id));
    }
    if !(rules.min_score..=rules.max_score).contains(&score) {
        return Err(Error::InvalidScore {
            score,
            min: rules.min_score,
            max: rules.max_score,
        });
    }

    let worker = db
        .find_offered_service(booking.offered_service_id)
        .map(|s| s.owner)
        .unwrap_or(Owner::Orphaned);
    let rating = Rating {
        id: db.next_rating_id(),
        booking_id,
        client_id: client,
        worker,
        score,
        comment: comment.filter(|c| !c.trim().is_empty()),
        created_at: now,
    };
    db.ratings.push(rating.clone());
    Ok(rating)
}

pub fn ratings_for_worker(db: &Database, worker: UserId) -> Vec<&Rating> {
    let mut out: Vec<&Rating> = db.ratings.iter().filter(|r| r.worker.is(worker)).collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

/// Moyenne des notes, `None` sans aucune note.
pub fn average_rating(db: &Database, worker: UserId) -> Option<f64> {
    let scores: Vec<f64> = db
        .ratings
        .iter()
        .filter(|r| r.worker.is(worker))
        .map(|r| f64::from(r.score))
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}
