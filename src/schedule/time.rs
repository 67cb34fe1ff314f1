use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("invalid time format (expected HH:MM): {0:?}")]
    InvalidTimeFormat(String),
    #[error("invalid date format (expected YYYY-MM-DD): {0:?}")]
    InvalidDateFormat(String),
    #[error("invalid time range: {start}-{end} (end must be after start)")]
    EmptyRange { start: ClockTime, end: ClockTime },
}

/// Convertit `"HH:MM"` (24 h, zéro-paddé) en minutes depuis minuit.
pub fn parse_hhmm(raw: &str) -> Result<u16, TimeError> {
    let invalid = || TimeError::InvalidTimeFormat(raw.to_string());
    let bytes = raw.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    let digit = |b: u8| -> Result<u16, TimeError> {
        if b.is_ascii_digit() {
            Ok(u16::from(b - b'0'))
        } else {
            Err(invalid())
        }
    };
    let hours = digit(bytes[0])? * 10 + digit(bytes[1])?;
    let minutes = digit(bytes[3])? * 10 + digit(bytes[4])?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Date calendaire `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, TimeError> {
    if raw.len() != 10 {
        return Err(TimeError::InvalidDateFormat(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| TimeError::InvalidDateFormat(raw.to_string()))
}

/// Heure murale à la minute près.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn parse(raw: &str) -> Result<Self, TimeError> {
        parse_hhmm(raw).map(Self)
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < 24 * 60).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.0 / 60), u32::from(self.0 % 60), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = TimeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// Intervalle semi-ouvert `[start, end)` dans une journée.
///
/// Sérialisé comme `{"inicio": "HH:MM", "fin": "HH:MM"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeWire", into = "RangeWire")]
pub struct TimeRange {
    start: ClockTime,
    end: ClockTime,
}

#[derive(Serialize, Deserialize)]
struct RangeWire {
    inicio: ClockTime,
    fin: ClockTime,
}

impl TimeRange {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, TimeError> {
        if end <= start {
            return Err(TimeError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Construit un intervalle depuis deux chaînes `"HH:MM"`.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        Self::new(ClockTime::parse(start)?, ClockTime::parse(end)?)
    }

    pub fn start(&self) -> ClockTime {
        self.start
    }

    pub fn end(&self) -> ClockTime {
        self.end
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.0 - self.start.0
    }

    /// Deux intervalles qui se touchent (fin == début) ne se chevauchent pas.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(self, other)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl TryFrom<RangeWire> for TimeRange {
    type Error = TimeError;

    fn try_from(wire: RangeWire) -> Result<Self, Self::Error> {
        Self::new(wire.inicio, wire.fin)
    }
}

impl From<TimeRange> for RangeWire {
    fn from(range: TimeRange) -> Self {
        Self {
            inicio: range.start,
            fin: range.end,
        }
    }
}

pub fn overlaps(a: &TimeRange, b: &TimeRange) -> bool {
    a.start < b.end && a.end > b.start
}
