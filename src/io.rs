use crate::booking::StateCatalog;
use crate::model::{Database, ServiceTypeId};
use crate::offering::NewOfferedService;
use anyhow::{bail, Context};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::Path;

/// Import de services offerts depuis CSV:
/// header `service_type_id,description[,observations][,hourly_price][,images]` (images séparées par `;`)
pub fn import_services_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<NewOfferedService>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let type_raw = rec.get(0).context("missing service_type_id")?.trim();
        let service_type_id: i64 = type_raw
            .parse()
            .with_context(|| format!("invalid service_type_id: {type_raw}"))?;
        let description = non_empty(rec.get(1));
        if description.is_none() {
            bail!("invalid service row (empty description)");
        }
        let hourly_price = match non_empty(rec.get(3)) {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .with_context(|| format!("invalid hourly_price: {raw}"))?,
            ),
            None => None,
        };
        if hourly_price.is_some_and(|p| p < 0.0) {
            bail!("hourly_price must not be negative");
        }
        let images = rec
            .get(4)
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        out.push(NewOfferedService {
            service_type_id: ServiceTypeId::new(service_type_id),
            description,
            observations: non_empty(rec.get(2)),
            hourly_price,
            images,
        });
    }
    Ok(out)
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Export JSON de la base (jolie mise en forme)
pub fn export_database_json<P: AsRef<Path>>(path: P, db: &Database) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(db)?;
    fs::write(path, s)?;
    Ok(())
}

/// Export CSV des réservations:
/// header `id,client_id,offered_service_id,state,date,start,end,duration_minutes`
pub fn export_bookings_csv<P: AsRef<Path>>(
    path: P,
    db: &Database,
    catalog: &StateCatalog,
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record([
        "id",
        "client_id",
        "offered_service_id",
        "state",
        "date",
        "start",
        "end",
        "duration_minutes",
    ])?;
    for b in &db.bookings {
        let state = catalog.state_of(b.state_id)?;
        let slot = &b.selected_slot;
        w.write_record([
            b.id.to_string(),
            b.client_id.to_string(),
            b.offered_service_id.to_string(),
            state.name().to_string(),
            slot.date.format("%Y-%m-%d").to_string(),
            slot.range.start().to_string(),
            slot.range.end().to_string(),
            slot.duration_minutes.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_services_with_optional_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.csv");
        std::fs::write(
            &path,
            "service_type_id,description,observations,hourly_price,images\n\
             1,Poda de setos,,15.5,img/a.png; img/b.png\n\
             2,Limpieza,Trae sus productos,,\n",
        )
        .unwrap();
        let services = import_services_csv(&path).unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].hourly_price, Some(15.5));
        assert_eq!(services[0].images, vec!["img/a.png", "img/b.png"]);
        assert_eq!(services[1].observations.as_deref(), Some("Trae sus productos"));
        assert!(services[1].hourly_price.is_none());
    }

    #[test]
    fn rejects_rows_without_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.csv");
        std::fs::write(&path, "service_type_id,description\n1,\n").unwrap();
        assert!(import_services_csv(&path).is_err());
    }
}
