use super::{store, TimeRange, Weekday, WeeklySchedule};
use crate::error::{Error, Result};
use crate::model::{Database, OfferedServiceId, UserId};
use std::fmt;

/// Chevauchement entre l'horaire candidat et celui d'un service frère.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConflict {
    pub day: Weekday,
    pub candidate: TimeRange,
    pub existing: TimeRange,
    pub sibling: OfferedServiceId,
    pub sibling_description: Option<String>,
}

impl fmt::Display for ScheduleConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflict on {}: {} overlaps {} (service: {})",
            self.day.display_name(),
            self.candidate,
            self.existing,
            self.sibling_description.as_deref().unwrap_or("sin nombre")
        )
    }
}

/// Résultat de validation, tel que présenté à l'interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub detail: Option<String>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        Self {
            valid: true,
            detail: None,
        }
    }

    fn rejected(detail: String) -> Self {
        Self {
            valid: false,
            detail: Some(detail),
        }
    }
}

/// Premier chevauchement jour par jour entre deux horaires.
///
/// Seuls les créneaux hebdomadaires sont comparés ; les exceptions datées ne le sont pas.
pub fn first_overlap(
    candidate: &WeeklySchedule,
    existing: &WeeklySchedule,
) -> Option<(Weekday, TimeRange, TimeRange)> {
    Weekday::ALL.into_iter().find_map(|day| {
        candidate.ranges(day).iter().find_map(|a| {
            existing
                .ranges(day)
                .iter()
                .find(|b| a.overlaps(b))
                .map(|b| (day, *a, *b))
        })
    })
}

/// Cherche un conflit entre `candidate` et les horaires des autres services du travailleur.
pub fn find_conflict(
    db: &Database,
    worker: UserId,
    candidate: &WeeklySchedule,
    exclude: Option<OfferedServiceId>,
) -> Result<Option<ScheduleConflict>> {
    for sibling in db.services_of(worker) {
        if Some(sibling.id) == exclude {
            continue;
        }
        let Some(existing) = store::get(db, sibling.id)? else {
            continue;
        };
        if let Some((day, a, b)) = first_overlap(candidate, &existing) {
            tracing::debug!(worker = %worker, sibling = %sibling.id, day = %day, "schedule overlap");
            return Ok(Some(ScheduleConflict {
                day,
                candidate: a,
                existing: b,
                sibling: sibling.id,
                sibling_description: sibling.description.clone(),
            }));
        }
    }
    Ok(None)
}

/// Validation « fail safe » : toute erreur de lecture compte comme un refus.
pub fn validate(
    db: &Database,
    worker: UserId,
    candidate_json: &str,
    exclude: Option<OfferedServiceId>,
) -> ValidationOutcome {
    let outcome = WeeklySchedule::from_json(candidate_json)
        .map_err(Error::MalformedSchedule)
        .and_then(|candidate| find_conflict(db, worker, &candidate, exclude));
    match outcome {
        Ok(None) => ValidationOutcome::ok(),
        Ok(Some(conflict)) => ValidationOutcome::rejected(conflict.to_string()),
        Err(err) => ValidationOutcome::rejected(format!("error while validating schedules: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OfferedService, Owner, ScheduleRow, ServiceTypeId};
    use chrono::NaiveDate;

    fn offered(db: &mut Database, worker: UserId, description: &str) -> OfferedServiceId {
        let id = db.next_offered_service_id();
        let at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        db.offered_services.push(OfferedService {
            id,
            owner: Owner::Worker(worker),
            service_type_id: ServiceTypeId::new(1),
            description: Some(description.to_string()),
            observations: None,
            hourly_price: None,
            created_at: at,
            updated_at: at,
            images: Vec::new(),
        });
        id
    }

    fn monday(start: &str, end: &str) -> String {
        format!(r#"{{"horario_regular": {{"lunes": [{{"inicio": "{start}", "fin": "{end}"}}]}}}}"#)
    }

    fn setup() -> (Database, UserId, OfferedServiceId, OfferedServiceId) {
        let mut db = Database::default();
        let worker = UserId::new(7);
        let a = offered(&mut db, worker, "Limpieza");
        let b = offered(&mut db, worker, "Jardinería");
        store::replace(&mut db, a, &WeeklySchedule::from_json(&monday("09:00", "12:00")).unwrap())
            .unwrap();
        (db, worker, a, b)
    }

    #[test]
    fn overlapping_sibling_is_rejected() {
        let (db, worker, _, b) = setup();
        let outcome = validate(&db, worker, &monday("10:00", "11:00"), Some(b));
        assert!(!outcome.valid);
        insta::assert_snapshot!(
            outcome.detail.unwrap(),
            @"conflict on Lunes: 10:00-11:00 overlaps 09:00-12:00 (service: Limpieza)"
        );
    }

    #[test]
    fn touching_boundary_is_accepted() {
        let (db, worker, _, b) = setup();
        let outcome = validate(&db, worker, &monday("12:00", "13:00"), Some(b));
        assert_eq!(outcome, ValidationOutcome { valid: true, detail: None });
    }

    #[test]
    fn excluded_service_is_not_compared_with_itself() {
        let (db, worker, a, _) = setup();
        assert!(validate(&db, worker, &monday("09:00", "12:00"), Some(a)).valid);
    }

    #[test]
    fn other_workers_are_ignored() {
        let (db, _, _, _) = setup();
        assert!(validate(&db, UserId::new(99), &monday("09:00", "12:00"), None).valid);
    }

    #[test]
    fn exceptions_are_not_compared() {
        let (db, worker, _, b) = setup();
        let candidate = r#"{"excepciones": [{"fecha": "2025-06-02", "disponible": true, "inicio": "09:00", "fin": "12:00"}]}"#;
        assert!(validate(&db, worker, candidate, Some(b)).valid);
    }

    #[test]
    fn malformed_input_fails_safe() {
        let (mut db, worker, _, b) = setup();
        let outcome = validate(&db, worker, "{", Some(b));
        assert!(!outcome.valid);
        assert!(outcome.detail.unwrap().starts_with("error while validating schedules"));

        db.schedules.push(ScheduleRow {
            offered_service_id: b,
            horario_json: "{oops".into(),
        });
        let outcome = validate(&db, worker, &monday("20:00", "21:00"), None);
        assert!(!outcome.valid);
        assert!(outcome.detail.unwrap().contains("corrupt"));
    }

    #[test]
    fn missing_description_uses_placeholder() {
        let conflict = ScheduleConflict {
            day: Weekday::Miercoles,
            candidate: TimeRange::parse("08:00", "10:00").unwrap(),
            existing: TimeRange::parse("09:00", "11:00").unwrap(),
            sibling: OfferedServiceId::new(2),
            sibling_description: None,
        };
        insta::assert_snapshot!(
            conflict.to_string(),
            @"conflict on Miércoles: 08:00-10:00 overlaps 09:00-11:00 (service: sin nombre)"
        );
    }
}
