//! Record dates

use chrono::NaiveDate;

/// Date given to records whose stored date could not be read (1970-01-01)
pub fn undated() -> NaiveDate {
    NaiveDate::default()
}

/// Parse a date as written by users or by earlier exports.
///
/// Accepts `YYYY-MM-DD` (anything after a `T` is ignored) and `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%d/%m/%Y"))
        .ok()
}

/// Serde adapter for record dates.
///
/// Writes `YYYY-MM-DD`. Reads anything [`parse_date`] accepts; empty,
/// `null` or unreadable values load as [`undated`] instead of failing the
/// whole snapshot.
pub mod serde_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    use super::{parse_date, undated};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(parse_date(&raw).unwrap_or_else(|| {
            warn!(date = %raw, "Unreadable record date, loading as undated");
            undated()
        }))
    }
}
