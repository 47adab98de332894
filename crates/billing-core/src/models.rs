use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key of the global fallback rate in the parameter store.
pub const GLOBAL_RATE_KEY: &str = "dailyRate";

/// Global daily rate used when the parameter was never set.
pub const DEFAULT_GLOBAL_RATE: f64 = 100.0;

/// A block of time logged against a mission on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    /// Unique entry identifier.
    pub id: String,
    /// Mission this time was spent on.
    pub mission_id: String,
    /// Type tag used for breakdowns.
    pub type_id: String,
    /// Calendar day the work happened. Time of day is irrelevant.
    pub date: NaiveDate,
    /// Minutes worked.
    pub duration_minutes: u32,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A billable engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Amount billed for one full baseline day. `None` means the rate is unknown.
    #[serde(default)]
    pub daily_rate: Option<f64>,
    /// Minutes making up one billable day. Absent or non-positive values fall
    /// back to the default baseline.
    #[serde(default)]
    pub baseline_daily_minutes: Option<f64>,
}

/// A label used only to group entries in breakdowns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTag {
    pub id: String,
    pub name: String,
}

/// A payment actually received for one calendar month.
///
/// At most one payment exists per month; the store that creates payments
/// enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    /// First day of the paid month.
    #[serde(with = "month_format")]
    pub month: NaiveDate,
    pub amount: f64,
}

/// Missions and type tags indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    missions: HashMap<String, Mission>,
    types: HashMap<String, TypeTag>,
}

impl Catalog {
    pub fn new(missions: Vec<Mission>, types: Vec<TypeTag>) -> Self {
        Self {
            missions: missions.into_iter().map(|m| (m.id.clone(), m)).collect(),
            types: types.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn mission(&self, id: &str) -> Option<&Mission> {
        self.missions.get(id)
    }

    /// Display title of a mission, falling back to its id.
    pub fn mission_title<'a>(&'a self, id: &'a str) -> &'a str {
        match self.missions.get(id) {
            Some(m) if !m.title.is_empty() => &m.title,
            _ => id,
        }
    }

    /// Display name of a type tag, falling back to its id.
    pub fn type_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.types.get(id).map(|t| t.name.as_str()).unwrap_or(id)
    }

    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// Serde adapter for month values.
///
/// Serialises as `"YYYY-MM"`; accepts `"YYYY-MM"` or any `"YYYY-MM-DD"` and
/// normalises to the first day of that month.
pub mod month_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::calendar::{month_key, parse_month};

    pub fn serialize<S: Serializer>(month: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&month_key(*month))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_month(&raw).map_err(serde::de::Error::custom)
    }
}
