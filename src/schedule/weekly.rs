use super::time::{ClockTime, TimeError, TimeRange};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Jours de la semaine, clés fixes du format JSON (`"lunes"` .. `"domingo"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Lunes,
    Martes,
    Miercoles,
    Jueves,
    Viernes,
    Sabado,
    Domingo,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Lunes,
        Weekday::Martes,
        Weekday::Miercoles,
        Weekday::Jueves,
        Weekday::Viernes,
        Weekday::Sabado,
        Weekday::Domingo,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Weekday::Lunes => "lunes",
            Weekday::Martes => "martes",
            Weekday::Miercoles => "miercoles",
            Weekday::Jueves => "jueves",
            Weekday::Viernes => "viernes",
            Weekday::Sabado => "sabado",
            Weekday::Domingo => "domingo",
        }
    }

    /// Nom affichable, utilisé dans les messages de conflit.
    pub fn display_name(self) -> &'static str {
        match self {
            Weekday::Lunes => "Lunes",
            Weekday::Martes => "Martes",
            Weekday::Miercoles => "Miércoles",
            Weekday::Jueves => "Jueves",
            Weekday::Viernes => "Viernes",
            Weekday::Sabado => "Sábado",
            Weekday::Domingo => "Domingo",
        }
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_monday() as usize]
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|day| day.key() == s)
            .ok_or_else(|| format!("unknown weekday key: {s:?}"))
    }
}

/// Exception datée : jour férié (`available == false`) ou plage spéciale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExceptionWire", into = "ExceptionWire")]
pub struct ScheduleException {
    pub date: NaiveDate,
    pub available: bool,
    pub range: Option<TimeRange>,
}

#[derive(Serialize, Deserialize)]
struct ExceptionWire {
    fecha: NaiveDate,
    #[serde(default)]
    disponible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inicio: Option<ClockTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fin: Option<ClockTime>,
}

impl TryFrom<ExceptionWire> for ScheduleException {
    type Error = String;

    fn try_from(wire: ExceptionWire) -> Result<Self, Self::Error> {
        let range = match (wire.inicio, wire.fin) {
            (Some(start), Some(end)) => {
                Some(TimeRange::new(start, end).map_err(|e: TimeError| e.to_string())?)
            }
            (None, None) => None,
            _ => {
                return Err(format!(
                    "exception {} must define both inicio and fin, or neither",
                    wire.fecha
                ))
            }
        };
        Ok(Self {
            date: wire.fecha,
            available: wire.disponible,
            range,
        })
    }
}

impl From<ScheduleException> for ExceptionWire {
    fn from(exception: ScheduleException) -> Self {
        Self {
            fecha: exception.date,
            disponible: exception.available,
            inicio: exception.range.map(|r| r.start()),
            fin: exception.range.map(|r| r.end()),
        }
    }
}

/// Disponibilité hebdomadaire récurrente d'un service offert.
///
/// Format JSON :
/// `{"horario_regular": {"lunes": [{"inicio": "09:00", "fin": "12:00"}], ...}, "excepciones": [...]}`.
/// Un jour absent équivaut à un jour vide ; une clé de jour inconnue est refusée.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleWire", into = "ScheduleWire")]
pub struct WeeklySchedule {
    by_day: BTreeMap<Weekday, Vec<TimeRange>>,
    pub exceptions: Vec<ScheduleException>,
}

#[derive(Serialize, Deserialize)]
struct ScheduleWire {
    #[serde(default)]
    horario_regular: BTreeMap<String, Vec<TimeRange>>,
    #[serde(default)]
    excepciones: Vec<ScheduleException>,
}

impl TryFrom<ScheduleWire> for WeeklySchedule {
    type Error = String;

    fn try_from(wire: ScheduleWire) -> Result<Self, Self::Error> {
        let mut by_day = BTreeMap::new();
        for (key, ranges) in wire.horario_regular {
            let day: Weekday = key.parse()?;
            by_day.insert(day, ranges);
        }
        Ok(Self {
            by_day,
            exceptions: wire.excepciones,
        })
    }
}

impl From<WeeklySchedule> for ScheduleWire {
    fn from(schedule: WeeklySchedule) -> Self {
        Self {
            horario_regular: schedule
                .by_day
                .into_iter()
                .map(|(day, ranges)| (day.key().to_string(), ranges))
                .collect(),
            excepciones: schedule.exceptions,
        }
    }
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Ajoute une plage à un jour (l'ordre d'insertion est conservé).
    pub fn with_range(mut self, day: Weekday, range: TimeRange) -> Self {
        self.by_day.entry(day).or_default().push(range);
        self
    }

    pub fn with_exception(mut self, exception: ScheduleException) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn ranges(&self, day: Weekday) -> &[TimeRange] {
        self.by_day.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_day.values().all(Vec::is_empty) && self.exceptions.is_empty()
    }

    pub fn exception_on(&self, date: NaiveDate) -> Option<&ScheduleException> {
        self.exceptions.iter().find(|e| e.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "horario_regular": {
            "lunes": [{"inicio": "09:00", "fin": "12:00"}, {"inicio": "15:00", "fin": "18:00"}],
            "miercoles": [{"inicio": "10:00", "fin": "14:00"}],
            "domingo": []
        },
        "excepciones": [
            {"fecha": "2025-12-25", "disponible": false},
            {"fecha": "2025-12-31", "disponible": true, "inicio": "09:00", "fin": "11:00"}
        ]
    }"#;

    #[test]
    fn parses_wire_document() {
        let schedule = WeeklySchedule::from_json(SAMPLE).unwrap();
        assert_eq!(schedule.ranges(Weekday::Lunes).len(), 2);
        assert_eq!(schedule.ranges(Weekday::Lunes)[1].to_string(), "15:00-18:00");
        assert!(schedule.ranges(Weekday::Martes).is_empty());
        assert_eq!(schedule.exceptions.len(), 2);

        let eve = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let exception = schedule.exception_on(eve).unwrap();
        assert!(exception.available);
        assert_eq!(exception.range.unwrap().to_string(), "09:00-11:00");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let schedule = WeeklySchedule::from_json("{}").unwrap();
        assert!(schedule.is_empty());
    }

    #[test]
    fn rejects_unknown_day_keys_and_bad_ranges() {
        assert!(WeeklySchedule::from_json(r#"{"horario_regular": {"monday": []}}"#).is_err());
        assert!(WeeklySchedule::from_json(
            r#"{"horario_regular": {"lunes": [{"inicio": "9:00", "fin": "12:00"}]}}"#
        )
        .is_err());
        assert!(WeeklySchedule::from_json(
            r#"{"excepciones": [{"fecha": "2025-01-01", "disponible": true, "inicio": "09:00"}]}"#
        )
        .is_err());
    }

    #[test]
    fn serializes_back_to_spanish_keys() {
        let schedule = WeeklySchedule::new().with_range(
            Weekday::Miercoles,
            TimeRange::parse("08:00", "09:30").unwrap(),
        );
        let json = schedule.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"horario_regular":{"miercoles":[{"inicio":"08:00","fin":"09:30"}]},"excepciones":[]}"#
        );
        assert_eq!(WeeklySchedule::from_json(&json).unwrap(), schedule);
    }

    #[test]
    fn weekday_of_date() {
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_eq!(Weekday::of_date(tuesday), Weekday::Martes);
        assert_eq!("sabado".parse::<Weekday>(), Ok(Weekday::Sabado));
    }
}
