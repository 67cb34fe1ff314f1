use super::WeeklySchedule;
use crate::error::{Error, Result};
use crate::model::{Database, OfferedServiceId, ScheduleRow};

/// Lit l'horaire d'un service. Un JSON stocké illisible est une erreur fatale.
pub fn get(db: &Database, offered_service: OfferedServiceId) -> Result<Option<WeeklySchedule>> {
    let Some(row) = db
        .schedules
        .iter()
        .find(|row| row.offered_service_id == offered_service)
    else {
        return Ok(None);
    };
    WeeklySchedule::from_json(&row.horario_json)
        .map(Some)
        .map_err(|source| Error::ScheduleCorrupt {
            offered_service,
            source,
        })
}

/// Remplace l'horaire : suppression puis insertion, dans la même transaction.
pub fn replace(
    db: &mut Database,
    offered_service: OfferedServiceId,
    schedule: &WeeklySchedule,
) -> Result<()> {
    let horario_json = schedule.to_json().map_err(anyhow::Error::from)?;
    delete(db, offered_service);
    db.schedules.push(ScheduleRow {
        offered_service_id: offered_service,
        horario_json,
    });
    Ok(())
}

/// Supprime l'horaire s'il existe ; renvoie `true` si une ligne a été retirée.
pub fn delete(db: &mut Database, offered_service: OfferedServiceId) -> bool {
    let before = db.schedules.len();
    db.schedules
        .retain(|row| row.offered_service_id != offered_service);
    db.schedules.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{TimeRange, Weekday};

    fn schedule(start: &str, end: &str) -> WeeklySchedule {
        WeeklySchedule::new().with_range(Weekday::Lunes, TimeRange::parse(start, end).unwrap())
    }

    #[test]
    fn replace_twice_keeps_a_single_row() {
        let mut db = Database::default();
        let id = OfferedServiceId::new(3);
        replace(&mut db, id, &schedule("09:00", "12:00")).unwrap();
        replace(&mut db, id, &schedule("13:00", "14:00")).unwrap();

        assert_eq!(db.schedules.len(), 1);
        let stored = get(&db, id).unwrap().unwrap();
        assert_eq!(stored, schedule("13:00", "14:00"));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut db = Database::default();
        let id = OfferedServiceId::new(1);
        assert!(!delete(&mut db, id));
        replace(&mut db, id, &schedule("09:00", "10:00")).unwrap();
        assert!(delete(&mut db, id));
        assert!(get(&db, id).unwrap().is_none());
    }

    #[test]
    fn corrupt_row_is_surfaced() {
        let mut db = Database::default();
        let id = OfferedServiceId::new(8);
        db.schedules.push(ScheduleRow {
            offered_service_id: id,
            horario_json: "{not json".into(),
        });
        assert!(matches!(
            get(&db, id),
            Err(Error::ScheduleCorrupt { offered_service, .. }) if offered_service == id
        ));
    }
}
