//! Calendar bucket boundaries in a configured time zone.
//!
//! Every function here works on calendar days ([`NaiveDate`]). The only
//! zone-sensitive step is resolving "today" from an instant, which goes
//! through [`ZonedClock`] so that callers pass `now` explicitly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BillingError, Result};

/// Upper bound on buckets produced by one call. Roughly 270 years of days.
pub const MAX_BUCKETS: usize = 100_000;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Parse an IANA timezone name, falling back to UTC with a warning.
pub fn parse_timezone(tz_name: &str) -> Tz {
    tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!(
            "unrecognised timezone \"{}\", falling back to UTC",
            tz_name
        );
        Tz::UTC
    })
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

// ── ZonedClock ────────────────────────────────────────────────────────────────

/// A fixed instant viewed from the configured time zone.
///
/// All "today / this week / this month" framing resolves through here, never
/// through an ambient clock, so reports are reproducible for a given `now`.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
    now: DateTime<Utc>,
}

impl ZonedClock {
    /// Build a clock from an IANA name. Unknown names fall back to UTC.
    pub fn new(tz_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            tz: parse_timezone(tz_name),
            now,
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// The calendar day of `now` in the configured zone.
    pub fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.tz).date_naive()
    }

    /// First day of the current month.
    pub fn current_month(&self) -> NaiveDate {
        month_start(self.today())
    }

    /// The full calendar period of the given granularity containing today.
    pub fn current(&self, granularity: Granularity) -> DateRange {
        let (start, end) = period_containing(granularity, self.today());
        DateRange { start, end }
    }
}

// ── Granularity ───────────────────────────────────────────────────────────────

/// Width of a reporting bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    /// ISO week, Monday through Sunday.
    Week,
    Month,
    Year,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        f.write_str(s)
    }
}

impl FromStr for Granularity {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            other => Err(BillingError::Config(format!("unknown granularity: {other}"))),
        }
    }
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// An inclusive range of calendar days. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Like [`DateRange::new`] but reports the rejected bounds.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(start, end).ok_or_else(|| BillingError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The calendar month containing `date`.
    pub fn month(date: NaiveDate) -> Self {
        Self {
            start: month_start(date),
            end: month_end(date),
        }
    }

    /// The calendar year containing `date`.
    pub fn year(date: NaiveDate) -> Self {
        let (start, end) = period_containing(Granularity::Year, date);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn buckets(&self, granularity: Granularity) -> Vec<PeriodBucket> {
        buckets_for(granularity, self.start, self.end)
    }
}

// ── PeriodBucket ──────────────────────────────────────────────────────────────

/// One bucket of a tiled range.
///
/// `start..=end` is the counted window: entries outside it are excluded
/// from the bucket's totals. `period_start..=period_end` is the full
/// calendar period, which for weeks may extend past the requested range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBucket {
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub label: String,
}

impl PeriodBucket {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether the counted window is narrower than the calendar period.
    pub fn is_clipped(&self) -> bool {
        self.start != self.period_start || self.end != self.period_end
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Tile `[range_start, range_end]` with buckets of the given granularity.
///
/// Buckets are aligned to calendar periods (weeks start on Monday) and
/// clipped to the range, so adjacent buckets satisfy
/// `bucket[i].end + 1 day == bucket[i + 1].start`. An empty range yields an
/// empty vector.
pub fn buckets_for(
    granularity: Granularity,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Vec<PeriodBucket> {
    let mut buckets = Vec::new();
    if range_end < range_start {
        return buckets;
    }

    let mut cursor = range_start;
    loop {
        if buckets.len() >= MAX_BUCKETS {
            warn!(
                %granularity,
                %range_start,
                %range_end,
                "bucket limit reached, truncating range"
            );
            break;
        }

        let (period_start, period_end) = period_containing(granularity, cursor);
        let end = period_end.min(range_end);
        buckets.push(PeriodBucket {
            granularity,
            start: cursor,
            end,
            period_start,
            period_end,
            label: bucket_label(granularity, period_start),
        });

        if end >= range_end {
            break;
        }
        match end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    buckets
}

/// The Monday-based weeks of the month containing `date`, clipped to the month.
pub fn month_weeks(date: NaiveDate) -> Vec<PeriodBucket> {
    DateRange::month(date).buckets(Granularity::Week)
}

/// First days of every month from `first` through `last`, inclusive.
pub fn months_between(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    buckets_for(Granularity::Month, month_start(first), month_end(last))
        .into_iter()
        .map(|b| b.period_start)
        .collect()
}

/// Full calendar period of `granularity` containing `date`.
pub fn period_containing(granularity: Granularity, date: NaiveDate) -> (NaiveDate, NaiveDate) {
    match granularity {
        Granularity::Day => (date, date),
        Granularity::Week => {
            let back = u64::from(date.weekday().num_days_from_monday());
            let start = date.checked_sub_days(Days::new(back)).unwrap_or(date);
            let end = start.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
            (start, end)
        }
        Granularity::Month => (month_start(date), month_end(date)),
        Granularity::Year => {
            let start = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
            let end = NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date);
            (start, end)
        }
    }
}

/// Human-readable key for the period starting at `period_start`.
pub fn bucket_label(granularity: Granularity, period_start: NaiveDate) -> String {
    match granularity {
        Granularity::Day => period_start.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let iso = period_start.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Granularity::Month => month_key(period_start),
        Granularity::Year => period_start.format("%Y").to_string(),
    }
}

// ── Month helpers ─────────────────────────────────────────────────────────────

pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// `"YYYY-MM"` key of the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Parse `"YYYY-MM-DD"`.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| BillingError::InvalidDate(s.to_string()))
}

/// Parse `"YYYY-MM"` or `"YYYY-MM-DD"` into the first day of that month.
pub fn parse_month(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(month_start(date));
    }
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map_err(|_| BillingError::InvalidDate(s.to_string()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn assert_tiles(buckets: &[PeriodBucket], start: NaiveDate, end: NaiveDate) {
        assert_eq!(buckets.first().unwrap().start, start);
        assert_eq!(buckets.last().unwrap().end, end);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
        }
    }

    // ── buckets_for ──────────────────────────────────────────────────────────

    #[test]
    fn test_tiling_holds_for_every_granularity() {
        let start = d(2024, 12, 18);
        let end = d(2026, 2, 3);
        for g in [
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Year,
        ] {
            let buckets = buckets_for(g, start, end);
            assert_tiles(&buckets, start, end);
        }
    }

    #[test]
    fn test_day_buckets_one_per_day() {
        let buckets = buckets_for(Granularity::Day, d(2025, 2, 27), d(2025, 3, 2));
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["2025-02-27", "2025-02-28", "2025-03-01", "2025-03-02"]
        );
    }

    #[test]
    fn test_week_buckets_start_on_monday() {
        // 2025-03-01 is a Saturday.
        let buckets = buckets_for(Granularity::Week, d(2025, 3, 1), d(2025, 3, 20));
        assert_eq!(buckets[0].period_start, d(2025, 2, 24));
        assert_eq!(buckets[0].period_start.weekday(), Weekday::Mon);
        assert_eq!(buckets[0].start, d(2025, 3, 1));
        assert!(buckets[0].is_clipped());
        assert_eq!(buckets[1].start, d(2025, 3, 3));
        assert!(!buckets[1].is_clipped());
        assert_eq!(buckets.last().unwrap().end, d(2025, 3, 20));
        assert_eq!(buckets.last().unwrap().period_end, d(2025, 3, 23));
    }

    #[test]
    fn test_month_weeks_clipped_to_month() {
        let weeks = month_weeks(d(2025, 3, 10));
        assert_eq!(weeks.len(), 6);
        assert_eq!(weeks[0].start, d(2025, 3, 1));
        assert_eq!(weeks[0].end, d(2025, 3, 2));
        assert_eq!(weeks[5].start, d(2025, 3, 31));
        assert_eq!(weeks[5].end, d(2025, 3, 31));
        assert_eq!(weeks[5].period_end, d(2025, 4, 6));
        assert!(!weeks[5].contains(d(2025, 4, 1)));
    }

    #[test]
    fn test_month_buckets_align_to_calendar() {
        let buckets = buckets_for(Granularity::Month, d(2024, 1, 1), d(2024, 3, 31));
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[1].start, d(2024, 2, 1));
        assert_eq!(buckets[1].end, d(2024, 2, 29));
        assert_eq!(buckets[1].label, "2024-02");
    }

    #[test]
    fn test_year_bucket_labels() {
        let buckets = buckets_for(Granularity::Year, d(2024, 6, 1), d(2025, 6, 1));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "2024");
        assert_eq!(buckets[0].period_start, d(2024, 1, 1));
        assert_eq!(buckets[1].period_end, d(2025, 12, 31));
    }

    #[test]
    fn test_week_label_uses_iso_year() {
        // Monday 2024-12-30 belongs to ISO week 1 of 2025.
        assert_eq!(bucket_label(Granularity::Week, d(2024, 12, 30)), "2025-W01");
    }

    #[test]
    fn test_empty_range_yields_no_buckets() {
        assert!(buckets_for(Granularity::Day, d(2025, 3, 2), d(2025, 3, 1)).is_empty());
    }

    #[test]
    fn test_single_day_range() {
        let buckets = buckets_for(Granularity::Year, d(2025, 3, 2), d(2025, 3, 2));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].start, d(2025, 3, 2));
        assert_eq!(buckets[0].end, d(2025, 3, 2));
    }

    #[test]
    fn test_bucket_limit_bounds_iteration() {
        let buckets = buckets_for(Granularity::Day, NaiveDate::MIN, NaiveDate::MAX);
        assert_eq!(buckets.len(), MAX_BUCKETS);
    }

    // ── month helpers ────────────────────────────────────────────────────────

    #[test]
    fn test_months_between_inclusive() {
        let months = months_between(d(2024, 11, 15), d(2025, 2, 3));
        assert_eq!(
            months,
            vec![d(2024, 11, 1), d(2024, 12, 1), d(2025, 1, 1), d(2025, 2, 1)]
        );
    }

    #[test]
    fn test_parse_month_formats() {
        assert_eq!(parse_month("2025-03").unwrap(), d(2025, 3, 1));
        assert_eq!(parse_month("2025-03-31").unwrap(), d(2025, 3, 1));
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-03-31").unwrap(), d(2025, 3, 31));
        assert!(matches!(
            parse_date("31/03/2025"),
            Err(BillingError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_date_range_rejects_reversed_bounds() {
        assert!(DateRange::new(d(2025, 3, 2), d(2025, 3, 1)).is_none());
        assert!(DateRange::try_new(d(2025, 3, 2), d(2025, 3, 1)).is_err());
        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap();
        assert!(range.contains(d(2025, 3, 31)));
        assert!(!range.contains(d(2025, 4, 1)));
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert_eq!("Monthly".parse::<Granularity>().unwrap(), Granularity::Month);
        assert!("fortnight".parse::<Granularity>().is_err());
    }

    // ── ZonedClock ───────────────────────────────────────────────────────────

    #[test]
    fn test_today_resolves_in_configured_zone() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 23, 30, 0).unwrap();
        let paris = ZonedClock::new("Europe/Paris", now);
        assert_eq!(paris.today(), d(2025, 4, 1));
        assert_eq!(paris.current_month(), d(2025, 4, 1));

        let utc = ZonedClock::new("UTC", now);
        assert_eq!(utc.today(), d(2025, 3, 31));
        assert_eq!(utc.current_month(), d(2025, 3, 1));
    }

    #[test]
    fn test_current_week_is_monday_to_sunday() {
        let now = Utc.with_ymd_and_hms(2025, 3, 13, 12, 0, 0).unwrap();
        let week = ZonedClock::new("UTC", now).current(Granularity::Week);
        assert_eq!(week.start, d(2025, 3, 10));
        assert_eq!(week.end, d(2025, 3, 16));
    }

    #[test]
    fn test_unknown_zone_falls_back_to_utc() {
        let now = Utc.with_ymd_and_hms(2025, 3, 13, 12, 0, 0).unwrap();
        let clock = ZonedClock::new("Mars/Olympus", now);
        assert_eq!(clock.tz(), Tz::UTC);
    }

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("Europe/Paris"));
        assert!(!validate_timezone("not-a-timezone"));
    }

    #[test]
    fn test_get_system_timezone_returns_nonempty_string() {
        assert!(!get_system_timezone().is_empty());
    }
}
