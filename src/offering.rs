//! Catalogue des services offerts par les travailleurs et leurs horaires.

use crate::booking::{transitions, StateCatalog};
use crate::error::{Error, Result};
use crate::model::{BookingId, Database, OfferedService, OfferedServiceId, Owner, ServiceTypeId, UserId};
use crate::notification::Notice;
use crate::schedule::{conflicts, store, WeeklySchedule};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Données de création d'un service offert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOfferedService {
    pub service_type_id: ServiceTypeId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub hourly_price: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Modification partielle : seuls les champs renseignés sont remplacés.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServicePatch {
    pub description: Option<String>,
    pub observations: Option<String>,
    pub hourly_price: Option<f64>,
}

/// Résultat d'un retrait de travailleur.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retirement {
    pub orphaned_services: Vec<OfferedServiceId>,
    pub cancelled_bookings: Vec<BookingId>,
}

fn active_worker(db: &Database, worker: UserId) -> Result<()> {
    match db.find_user(worker) {
        None => Err(Error::UnknownUser(worker)),
        Some(user) if user.retired => Err(Error::Unauthorized("worker has been retired")),
        Some(_) => Ok(()),
    }
}

fn owned_mut(
    db: &mut Database,
    worker: UserId,
    id: OfferedServiceId,
) -> Result<&mut OfferedService> {
    let service = db
        .find_offered_service_mut(id)
        .ok_or(Error::UnknownOfferedService(id))?;
    if !service.owner.is(worker) {
        return Err(Error::Unauthorized("offered service belongs to another worker"));
    }
    Ok(service)
}

pub fn create(
    db: &mut Database,
    worker: UserId,
    new: NewOfferedService,
    now: NaiveDateTime,
) -> Result<OfferedService> {
    active_worker(db, worker)?;
    if db.find_service_type(new.service_type_id).is_none() {
        return Err(Error::UnknownServiceType(new.service_type_id));
    }
    let service = OfferedService {
        id: db.next_offered_service_id(),
        owner: Owner::Worker(worker),
        service_type_id: new.service_type_id,
        description: new.description,
        observations: new.observations,
        hourly_price: new.hourly_price,
        created_at: now,
        updated_at: now,
        images: new.images,
    };
    db.offered_services.push(service.clone());
    tracing::debug!(worker = %worker, service = %service.id, "offered service created");
    Ok(service)
}

pub fn update(
    db: &mut Database,
    worker: UserId,
    id: OfferedServiceId,
    patch: ServicePatch,
    now: NaiveDateTime,
) -> Result<OfferedService> {
    let service = owned_mut(db, worker, id)?;
    if let Some(description) = patch.description {
        service.description = Some(description);
    }
    if let Some(observations) = patch.observations {
        service.observations = Some(observations);
    }
    if let Some(price) = patch.hourly_price {
        service.hourly_price = Some(price);
    }
    service.updated_at = now;
    Ok(service.clone())
}

pub fn attach_image<R: Into<String>>(
    db: &mut Database,
    worker: UserId,
    id: OfferedServiceId,
    reference: R,
) -> Result<()> {
    owned_mut(db, worker, id)?.images.push(reference.into());
    Ok(())
}

/// Supprime le service, son horaire et ses références d'images.
pub fn delete(db: &mut Database, worker: UserId, id: OfferedServiceId) -> Result<()> {
    owned_mut(db, worker, id)?;
    store::delete(db, id);
    db.offered_services.retain(|s| s.id != id);
    tracing::debug!(worker = %worker, service = %id, "offered service deleted");
    Ok(())
}

/// Services visibles publiquement (hors orphelins).
pub fn list_public(db: &Database) -> Vec<&OfferedService> {
    db.offered_services
        .iter()
        .filter(|s| s.owner.worker().is_some())
        .collect()
}

/// Valide puis remplace l'horaire d'un service du travailleur.
pub fn save_schedule(
    db: &mut Database,
    worker: UserId,
    id: OfferedServiceId,
    schedule_json: &str,
) -> Result<WeeklySchedule> {
    owned_mut(db, worker, id)?;
    let schedule = WeeklySchedule::from_json(schedule_json).map_err(Error::MalformedSchedule)?;
    if let Some(conflict) = conflicts::find_conflict(db, worker, &schedule, Some(id))? {
        return Err(Error::ScheduleConflict(conflict));
    }
    store::replace(db, id, &schedule)?;
    Ok(schedule)
}

pub fn delete_schedule(db: &mut Database, worker: UserId, id: OfferedServiceId) -> Result<bool> {
    owned_mut(db, worker, id)?;
    Ok(store::delete(db, id))
}

/// Retire un travailleur : services orphelins, réservations actives annulées.
pub fn retire_worker(
    db: &mut Database,
    catalog: &StateCatalog,
    worker: UserId,
    now: NaiveDateTime,
) -> Result<(Retirement, Vec<Notice>)> {
    if db.find_user(worker).is_none() {
        return Err(Error::UnknownUser(worker));
    }
    let services: Vec<OfferedServiceId> = db.services_of(worker).map(|s| s.id).collect();

    // les noms doivent encore être résolubles pour les notifications
    let (cancelled, notices) = transitions::withdraw(db, catalog, &services, now)?;

    for id in &services {
        store::delete(db, *id);
        if let Some(service) = db.find_offered_service_mut(*id) {
            service.owner = Owner::Orphaned;
            service.images.clear();
            service.updated_at = now;
        }
    }
    for rating in db.ratings.iter_mut().filter(|r| r.worker.is(worker)) {
        rating.worker = Owner::Orphaned;
    }
    if let Some(user) = db.find_user_mut(worker) {
        user.retired = true;
    }

    tracing::info!(
        worker = %worker,
        services = services.len(),
        bookings = cancelled.len(),
        "worker retired"
    );
    Ok((
        Retirement {
            orphaned_services: services,
            cancelled_bookings: cancelled,
        },
        notices,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
    }

    fn setup() -> (Database, UserId, ServiceTypeId) {
        let mut db = Database::seeded();
        let worker = db.add_user("Luis", "Gómez", None);
        let kind = db.add_service_type("Jardinería");
        (db, worker, kind)
    }

    fn new_service(kind: ServiceTypeId) -> NewOfferedService {
        NewOfferedService {
            service_type_id: kind,
            description: Some("Poda".into()),
            observations: None,
            hourly_price: None,
            images: Vec::new(),
        }
    }

    #[test]
    fn create_requires_known_service_type() {
        let (mut db, worker, _) = setup();
        let err = create(
            &mut db,
            worker,
            new_service(ServiceTypeId::new(99)),
            at("2025-01-01 00:00"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn update_only_touches_given_fields() {
        let (mut db, worker, kind) = setup();
        let service = create(&mut db, worker, new_service(kind), at("2025-01-01 00:00")).unwrap();
        let patch = ServicePatch {
            hourly_price: Some(20.0),
            ..Default::default()
        };
        let updated = update(&mut db, worker, service.id, patch, at("2025-02-01 00:00")).unwrap();
        assert_eq!(updated.description.as_deref(), Some("Poda"));
        assert_eq!(updated.hourly_price, Some(20.0));
        assert_eq!(updated.updated_at, at("2025-02-01 00:00"));

        let intruder = db.add_user("Otro", "", None);
        let err = update(&mut db, intruder, service.id, ServicePatch::default(), at("2025-02-01 00:00"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn delete_cascades_to_schedule() {
        let (mut db, worker, kind) = setup();
        let service = create(&mut db, worker, new_service(kind), at("2025-01-01 00:00")).unwrap();
        save_schedule(&mut db, worker, service.id, r#"{"horario_regular":{"lunes":[{"inicio":"09:00","fin":"12:00"}]}}"#)
            .unwrap();
        delete(&mut db, worker, service.id).unwrap();
        assert!(db.offered_services.is_empty());
        assert!(db.schedules.is_empty());
    }

    #[test]
    fn save_schedule_rejects_sibling_overlap() {
        let (mut db, worker, kind) = setup();
        let a = create(&mut db, worker, new_service(kind), at("2025-01-01 00:00")).unwrap();
        let b = create(&mut db, worker, new_service(kind), at("2025-01-01 00:00")).unwrap();
        save_schedule(&mut db, worker, a.id, r#"{"horario_regular":{"martes":[{"inicio":"09:00","fin":"12:00"}]}}"#)
            .unwrap();
        let err = save_schedule(&mut db, worker, b.id, r#"{"horario_regular":{"martes":[{"inicio":"11:00","fin":"13:00"}]}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(db.schedules.len(), 1);

        // l'horaire du service lui-même n'entre pas en conflit
        save_schedule(&mut db, worker, a.id, r#"{"horario_regular":{"martes":[{"inicio":"10:00","fin":"12:00"}]}}"#)
            .unwrap();
        assert_eq!(db.schedules.len(), 1);
    }

    #[test]
    fn retirement_orphans_services() {
        let (mut db, worker, kind) = setup();
        let catalog = StateCatalog::resolve(&db.booking_states).unwrap();
        let service = create(&mut db, worker, new_service(kind), at("2025-01-01 00:00")).unwrap();
        attach_image(&mut db, worker, service.id, "img/poda.png").unwrap();

        let (report, notices) = retire_worker(&mut db, &catalog, worker, at("2025-03-01 00:00")).unwrap();
        assert_eq!(report.orphaned_services, vec![service.id]);
        assert!(notices.is_empty());
        assert!(list_public(&db).is_empty());
        let stored = db.find_offered_service(service.id).unwrap();
        assert_eq!(stored.owner, Owner::Orphaned);
        assert!(stored.images.is_empty());

        let err = create(&mut db, worker, new_service(kind), at("2025-03-02 00:00")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }
}
