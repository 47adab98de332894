//! Per-bucket rollups of minutes and estimated revenue.
//!
//! [`RollupBuilder`] composes the period calendar, the entry grouping, and
//! the revenue estimator. Every amount in a rollup comes from
//! [`RevenueEstimator::estimate`] applied to the minutes one mission logged
//! inside one bucket; bucket totals are sums of those mission amounts.

use std::collections::{BTreeMap, HashSet};

use billing_core::calendar::{month_weeks, DateRange, Granularity, PeriodBucket};
use billing_core::formatting::rounded;
use billing_core::models::{Catalog, TimeEntry};
use billing_core::revenue::RevenueEstimator;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregator::EntryAggregator;

// ── MissionBreakdown ──────────────────────────────────────────────────────────

/// Minutes and amount one mission accumulated inside a bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionBreakdown {
    pub minutes: u64,
    /// Unrounded estimate for `minutes`.
    pub amount: f64,
    /// Type name → minutes.
    pub by_type: BTreeMap<String, u64>,
    /// Rank of this mission's first entry among the bucket's missions.
    first_seen: usize,
}

// ── Rollup ────────────────────────────────────────────────────────────────────

/// Aggregated output for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollup {
    pub bucket: PeriodBucket,
    pub total_minutes: u64,
    /// Unrounded sum of the mission amounts.
    pub total_amount: f64,
    /// Distinct days with at least one entry.
    pub worked_days: usize,
    /// Type name → minutes.
    pub by_type: BTreeMap<String, u64>,
    /// Mission id → breakdown.
    pub by_mission: BTreeMap<String, MissionBreakdown>,
}

impl Rollup {
    fn empty(bucket: PeriodBucket) -> Self {
        Self {
            bucket,
            total_minutes: 0,
            total_amount: 0.0,
            worked_days: 0,
            by_type: BTreeMap::new(),
            by_mission: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_mission.is_empty()
    }

    /// Missions ranked by amount, highest first. Equal amounts keep the
    /// order in which the missions first appeared in the input.
    pub fn top_missions(&self) -> Vec<(&str, &MissionBreakdown)> {
        let mut ranked: Vec<(&str, &MissionBreakdown)> = self
            .by_mission
            .iter()
            .map(|(id, b)| (id.as_str(), b))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.amount
                .total_cmp(&a.1.amount)
                .then(a.1.first_seen.cmp(&b.1.first_seen))
        });
        ranked
    }

    /// The outbound shape: rounded amounts, missions ranked by amount.
    pub fn report(&self, catalog: &Catalog) -> BucketReport {
        BucketReport {
            label: self.bucket.label.clone(),
            period_start: self.bucket.start,
            period_end: self.bucket.end,
            clipped: self.bucket.is_clipped(),
            total_minutes: self.total_minutes,
            total_amount: self.total_amount,
            worked_days: self.worked_days,
            by_type: self.by_type.clone(),
            by_mission: self
                .top_missions()
                .into_iter()
                .map(|(id, b)| MissionReport::new(id, b, catalog))
                .collect(),
        }
    }
}

// ── Reports (outbound) ────────────────────────────────────────────────────────

/// One mission line inside a [`BucketReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionReport {
    pub mission_id: String,
    pub title: String,
    pub minutes: u64,
    #[serde(serialize_with = "rounded::serialize")]
    pub amount: f64,
    /// `false` when the mission has no usable daily rate, so a zero amount
    /// means "unknown rate" rather than "no work".
    pub has_rate: bool,
    pub by_type: BTreeMap<String, u64>,
}

impl MissionReport {
    fn new(id: &str, breakdown: &MissionBreakdown, catalog: &Catalog) -> Self {
        Self {
            mission_id: id.to_string(),
            title: catalog.mission_title(id).to_string(),
            minutes: breakdown.minutes,
            amount: breakdown.amount,
            has_rate: catalog
                .mission(id)
                .map(RevenueEstimator::has_rate)
                .unwrap_or(false),
            by_type: breakdown.by_type.clone(),
        }
    }
}

/// One bucket as emitted to presentation and export collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketReport {
    pub label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Whether the counted window is narrower than the calendar period.
    pub clipped: bool,
    pub total_minutes: u64,
    #[serde(serialize_with = "rounded::serialize")]
    pub total_amount: f64,
    pub worked_days: usize,
    pub by_type: BTreeMap<String, u64>,
    pub by_mission: Vec<MissionReport>,
}

/// Whole-range totals across a sequence of rollups.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupTotals {
    pub bucket_count: usize,
    pub total_minutes: u64,
    #[serde(serialize_with = "rounded::serialize")]
    pub total_amount: f64,
    pub worked_days: usize,
}

impl RollupTotals {
    /// Sum rollups. Buckets never overlap, so worked days add up.
    pub fn from_rollups(rollups: &[Rollup]) -> Self {
        let mut totals = Self::default();
        for r in rollups {
            totals.bucket_count += 1;
            totals.total_minutes += r.total_minutes;
            totals.total_amount += r.total_amount;
            totals.worked_days += r.worked_days;
        }
        totals
    }
}

// ── RollupBuilder ─────────────────────────────────────────────────────────────

/// Builds rollups against one catalog snapshot.
pub struct RollupBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> RollupBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// One rollup per bucket of `granularity` tiling `range`, empty buckets
    /// included. Entries outside `range` are ignored.
    pub fn rollup(
        &self,
        entries: &[TimeEntry],
        granularity: Granularity,
        range: &DateRange,
    ) -> Vec<Rollup> {
        self.rollup_buckets(entries, range.buckets(granularity))
    }

    /// The weeks of the month containing `month`, each counting only the
    /// days inside that month. An entry on the last day of a month whose
    /// week spills into the next month is counted here and nowhere else.
    pub fn month_as_weeks(&self, entries: &[TimeEntry], month: NaiveDate) -> Vec<Rollup> {
        self.rollup_buckets(entries, month_weeks(month))
    }

    /// A single rollup covering all of `range`, tagged with the
    /// granularity the caller framed it as.
    pub fn single(
        &self,
        entries: &[TimeEntry],
        range: &DateRange,
        granularity: Granularity,
        label: &str,
    ) -> Rollup {
        let bucket = PeriodBucket {
            granularity,
            start: range.start,
            end: range.end,
            period_start: range.start,
            period_end: range.end,
            label: label.to_string(),
        };
        self.rollup_buckets(entries, vec![bucket.clone()])
            .pop()
            .unwrap_or_else(|| Rollup::empty(bucket))
    }

    /// Roll entries into pre-computed buckets.
    ///
    /// `buckets` must be sorted and non-overlapping, as produced by the
    /// period calendar. Each entry lands in at most one bucket.
    pub fn rollup_buckets(&self, entries: &[TimeEntry], buckets: Vec<PeriodBucket>) -> Vec<Rollup> {
        let mut slots: Vec<Vec<&TimeEntry>> = vec![Vec::new(); buckets.len()];
        let mut unknown_missions: HashSet<&str> = HashSet::new();

        for entry in entries {
            let slot = buckets.partition_point(|b| b.end < entry.date);
            if !buckets.get(slot).is_some_and(|b| b.contains(entry.date)) {
                continue;
            }
            slots[slot].push(entry);
            if self.catalog.mission(&entry.mission_id).is_none() {
                unknown_missions.insert(entry.mission_id.as_str());
            }
        }

        let placed: usize = slots.iter().map(Vec::len).sum();
        let rollups: Vec<Rollup> = buckets
            .into_iter()
            .zip(&slots)
            .map(|(bucket, bucket_entries)| self.rollup_one(bucket, bucket_entries))
            .collect();

        for id in unknown_missions {
            warn!(mission_id = id, "time entries reference an unknown mission, amount counted as 0");
        }
        debug!(
            buckets = rollups.len(),
            entries = entries.len(),
            placed,
            "rollup built"
        );

        rollups
    }

    /// Aggregate the entries already placed in `bucket`.
    fn rollup_one(&self, bucket: PeriodBucket, entries: &[&TimeEntry]) -> Rollup {
        let type_key = |e: &TimeEntry| self.catalog.type_name(&e.type_id).to_string();

        let by_mission: BTreeMap<String, MissionBreakdown> =
            EntryAggregator::group_sum_ordered(entries.iter().copied(), |e| e.mission_id.clone())
                .into_iter()
                .enumerate()
                .map(|(first_seen, (mission_id, minutes))| {
                    let by_type = EntryAggregator::group_sum(
                        entries.iter().copied().filter(|e| e.mission_id == mission_id),
                        type_key,
                    )
                    .into_iter()
                    .collect();
                    let amount =
                        RevenueEstimator::estimate_opt(minutes, self.catalog.mission(&mission_id));
                    let breakdown = MissionBreakdown {
                        minutes,
                        amount,
                        by_type,
                        first_seen,
                    };
                    (mission_id, breakdown)
                })
                .collect();

        Rollup {
            total_minutes: EntryAggregator::total_minutes(entries.iter().copied()),
            total_amount: by_mission.values().map(|b| b.amount).sum(),
            worked_days: EntryAggregator::distinct_days(entries.iter().copied()),
            by_type: EntryAggregator::group_sum(entries.iter().copied(), type_key)
                .into_iter()
                .collect(),
            by_mission,
            bucket,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
