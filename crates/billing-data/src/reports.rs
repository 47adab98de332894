//! Read endpoints built on a [`SnapshotSource`].
//!
//! Each function fetches one snapshot, then runs the pure engine over it.
//! Store failures propagate unchanged; no partial report is returned.

use std::time::Instant;

use billing_core::calendar::{
    month_end, month_start, period_containing, DateRange, Granularity, ZonedClock,
};
use billing_core::error::Result;
use billing_core::formatting::rounded;
use billing_core::models::{Catalog, TimeEntry};
use billing_core::revenue::RevenueEstimator;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::aggregator::EntryAggregator;
use crate::reconciler::{PaymentReconciler, Reconciliation};
use crate::rollup::{BucketReport, MissionReport, Rollup, RollupBuilder, RollupTotals};
use crate::store::SnapshotSource;

// ── Public types ──────────────────────────────────────────────────────────────

/// Context attached to every period report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Entries fetched for the report's range.
    pub entries_processed: usize,
    /// Mission filter applied, if any.
    pub mission: Option<String>,
}

/// An ordered list of buckets with whole-range totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    pub granularity: Granularity,
    pub range: DateRange,
    pub buckets: Vec<BucketReport>,
    pub totals: RollupTotals,
    pub metadata: ReportMetadata,
}

/// One entry of a day breakdown, with its own estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryLine {
    pub id: String,
    pub mission_id: String,
    pub mission_title: String,
    pub type_name: String,
    pub duration_minutes: u32,
    #[serde(serialize_with = "rounded::serialize")]
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBreakdown {
    pub date: NaiveDate,
    pub summary: BucketReport,
    pub entries: Vec<EntryLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCard {
    pub label: String,
    pub range: DateRange,
    pub total_minutes: u64,
    #[serde(serialize_with = "rounded::serialize")]
    pub total_amount: f64,
    pub worked_days: usize,
}

impl SummaryCard {
    fn from_rollup(rollup: &Rollup) -> Self {
        Self {
            label: rollup.bucket.label.clone(),
            range: rollup.bucket.range(),
            total_minutes: rollup.total_minutes,
            total_amount: rollup.total_amount,
            worked_days: rollup.worked_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeUsage {
    pub name: String,
    pub minutes: u64,
}

/// Today, this week, this month and this year in the configured zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub today: NaiveDate,
    pub timezone: String,
    pub day: SummaryCard,
    pub week: SummaryCard,
    pub month: SummaryCard,
    pub year: SummaryCard,
    pub most_used_type_this_month: Option<TypeUsage>,
    pub worked_days_this_month: usize,
    pub top_mission_today: Option<MissionReport>,
}

// ── Period exports ────────────────────────────────────────────────────────────

/// The days of the Monday-based week containing `anchor`.
pub fn weekly_export<S: SnapshotSource + ?Sized>(
    source: &S,
    anchor: NaiveDate,
    mission: Option<&str>,
) -> Result<PeriodReport> {
    let (start, end) = period_containing(Granularity::Week, anchor);
    range_report(source, DateRange { start, end }, Granularity::Day, mission)
}

/// The month containing `anchor`, reported as its weeks clipped to the month.
pub fn monthly_export<S: SnapshotSource + ?Sized>(
    source: &S,
    anchor: NaiveDate,
    mission: Option<&str>,
) -> Result<PeriodReport> {
    let range = DateRange::month(anchor);
    let (catalog, entries) = load(source, &range, mission)?;
    let rollups = RollupBuilder::new(&catalog).month_as_weeks(&entries, range.start);
    Ok(period_report(
        Granularity::Week,
        range,
        &rollups,
        &catalog,
        entries.len(),
        mission,
    ))
}

/// The twelve months of the year containing `anchor`, empty months included.
pub fn yearly_export<S: SnapshotSource + ?Sized>(
    source: &S,
    anchor: NaiveDate,
    mission: Option<&str>,
) -> Result<PeriodReport> {
    range_report(source, DateRange::year(anchor), Granularity::Month, mission)
}

/// Any granularity over an explicit range.
pub fn range_report<S: SnapshotSource + ?Sized>(
    source: &S,
    range: DateRange,
    granularity: Granularity,
    mission: Option<&str>,
) -> Result<PeriodReport> {
    let (catalog, entries) = load(source, &range, mission)?;
    let rollups = RollupBuilder::new(&catalog).rollup(&entries, granularity, &range);
    Ok(period_report(
        granularity,
        range,
        &rollups,
        &catalog,
        entries.len(),
        mission,
    ))
}

// ── Day breakdown ─────────────────────────────────────────────────────────────

/// Missions of one day ranked by amount, plus the individual entries.
pub fn day_breakdown<S: SnapshotSource + ?Sized>(
    source: &S,
    date: NaiveDate,
    mission: Option<&str>,
) -> Result<DayBreakdown> {
    let range = DateRange::day(date);
    let (catalog, entries) = load(source, &range, mission)?;
    let label = date.format("%Y-%m-%d").to_string();
    let summary = RollupBuilder::new(&catalog)
        .single(&entries, &range, Granularity::Day, &label)
        .report(&catalog);

    let lines = entries
        .iter()
        .map(|e| entry_line(e, &catalog))
        .collect::<Vec<_>>();

    Ok(DayBreakdown {
        date,
        summary,
        entries: lines,
    })
}

fn entry_line(entry: &TimeEntry, catalog: &Catalog) -> EntryLine {
    EntryLine {
        id: entry.id.clone(),
        mission_id: entry.mission_id.clone(),
        mission_title: catalog.mission_title(&entry.mission_id).to_string(),
        type_name: catalog.type_name(&entry.type_id).to_string(),
        duration_minutes: entry.duration_minutes,
        amount: RevenueEstimator::estimate_opt(
            u64::from(entry.duration_minutes),
            catalog.mission(&entry.mission_id),
        ),
        description: entry.description.clone(),
    }
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

pub fn dashboard<S: SnapshotSource + ?Sized>(source: &S, clock: &ZonedClock) -> Result<Dashboard> {
    let today = clock.today();
    let day = clock.current(Granularity::Day);
    let week = clock.current(Granularity::Week);
    let month = clock.current(Granularity::Month);
    let year = clock.current(Granularity::Year);

    // The week may straddle a year boundary.
    let span = DateRange {
        start: week.start.min(year.start),
        end: week.end.max(year.end),
    };
    let (catalog, entries) = load(source, &span, None)?;
    let builder = RollupBuilder::new(&catalog);

    let day_rollup = builder.single(&entries, &day, Granularity::Day, "today");
    let week_rollup = builder.single(&entries, &week, Granularity::Week, "week");
    let month_rollup = builder.single(&entries, &month, Granularity::Month, "month");
    let year_rollup = builder.single(&entries, &year, Granularity::Year, "year");

    let most_used_type_this_month = EntryAggregator::busiest_key(
        entries.iter().filter(|e| month.contains(e.date)),
        |e| catalog.type_name(&e.type_id).to_string(),
    )
    .map(|(name, minutes)| TypeUsage { name, minutes });

    let top_mission_today = day_rollup.report(&catalog).by_mission.into_iter().next();

    debug!(
        today = %today,
        entries = entries.len(),
        "dashboard computed"
    );

    Ok(Dashboard {
        today,
        timezone: clock.tz().name().to_string(),
        day: SummaryCard::from_rollup(&day_rollup),
        week: SummaryCard::from_rollup(&week_rollup),
        month: SummaryCard::from_rollup(&month_rollup),
        year: SummaryCard::from_rollup(&year_rollup),
        most_used_type_this_month,
        worked_days_this_month: month_rollup.worked_days,
        top_mission_today,
    })
}

// ── Payments ──────────────────────────────────────────────────────────────────

/// Reconcile payments from `since` (or the earliest payment) through the
/// clock's current month.
pub fn payment_statistics<S: SnapshotSource + ?Sized>(
    source: &S,
    clock: &ZonedClock,
    since: Option<NaiveDate>,
) -> Result<Reconciliation> {
    let current = clock.current_month();
    let payments = source.payments(None)?;
    let first = since
        .map(month_start)
        .or_else(|| payments.iter().map(|p| month_start(p.month)).min())
        .unwrap_or(current);

    let worked_days = match DateRange::new(first, month_end(current)) {
        Some(range) => {
            let entries = source.time_entries(&range, None)?;
            EntryAggregator::worked_days_by_month(&entries)
        }
        None => Default::default(),
    };
    let rate = source.global_rate()?;

    debug!(
        payments = payments.len(),
        months_worked = worked_days.len(),
        rate,
        "reconciling payments"
    );

    Ok(PaymentReconciler::reconcile(
        &payments,
        &worked_days,
        rate,
        Some(first),
        current,
    ))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn load<S: SnapshotSource + ?Sized>(
    source: &S,
    range: &DateRange,
    mission: Option<&str>,
) -> Result<(Catalog, Vec<TimeEntry>)> {
    let started = Instant::now();
    let catalog = source.catalog()?;
    let entries = source.time_entries(range, mission)?;
    debug!(
        start = %range.start,
        end = %range.end,
        missions = catalog.mission_count(),
        types = catalog.type_count(),
        entries = entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot loaded"
    );
    Ok((catalog, entries))
}

fn period_report(
    granularity: Granularity,
    range: DateRange,
    rollups: &[Rollup],
    catalog: &Catalog,
    entries_processed: usize,
    mission: Option<&str>,
) -> PeriodReport {
    PeriodReport {
        granularity,
        range,
        buckets: rollups.iter().map(|r| r.report(catalog)).collect(),
        totals: RollupTotals::from_rollups(rollups),
        metadata: ReportMetadata {
            entries_processed,
            mission: mission.map(str::to_string),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
