//! Estimate-versus-payment reconciliation per calendar month.
//!
//! The estimate here is deliberately coarser than the per-mission revenue
//! estimate: distinct worked days times one global daily rate.

use std::collections::{BTreeMap, HashMap};

use billing_core::calendar::{month_key, month_start, months_between};
use billing_core::formatting::{rounded, rounded_opt};
use billing_core::models::{month_format, Payment};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

/// Number of most recent months covered by the trailing totals.
pub const TRAILING_WINDOW: usize = 6;

// ── Output types ──────────────────────────────────────────────────────────────

/// One month of the reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthReconciliation {
    #[serde(with = "month_format")]
    pub month: NaiveDate,
    pub worked_days: u32,
    #[serde(serialize_with = "rounded::serialize")]
    pub estimate: f64,
    #[serde(serialize_with = "rounded::serialize")]
    pub actual: f64,
    pub paid: bool,
    /// `(actual - estimate) / estimate * 100`; `None` when the month is
    /// unpaid or its estimate is zero.
    #[serde(serialize_with = "rounded_opt::serialize")]
    pub variance_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationTotals {
    #[serde(serialize_with = "rounded::serialize")]
    pub total_actual: f64,
    #[serde(serialize_with = "rounded::serialize")]
    pub total_estimate: f64,
    #[serde(rename = "totalActual6", serialize_with = "rounded::serialize")]
    pub total_actual_6: f64,
    #[serde(rename = "totalEstimate6", serialize_with = "rounded::serialize")]
    pub total_estimate_6: f64,
    /// Mean of the defined monthly variances.
    #[serde(serialize_with = "rounded_opt::serialize")]
    pub average_variance_pct: Option<f64>,
    /// Mean payment over paid months.
    #[serde(serialize_with = "rounded_opt::serialize")]
    pub average_actual: Option<f64>,
    pub paid_months: usize,
    pub month_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub per_month: Vec<MonthReconciliation>,
    pub totals: ReconciliationTotals,
    /// Months without a payment, oldest first.
    #[serde(serialize_with = "serialize_months")]
    pub missing_months: Vec<NaiveDate>,
}

fn serialize_months<S: Serializer>(months: &[NaiveDate], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(months.iter().map(|m| month_key(*m)))
}

// ── PaymentReconciler ─────────────────────────────────────────────────────────

pub struct PaymentReconciler;

impl PaymentReconciler {
    /// Reconcile every month from the range start through `current_month`.
    ///
    /// The range starts at `since` when given, otherwise at the earliest
    /// payment, otherwise at `current_month`. A start after `current_month`
    /// yields an empty reconciliation.
    pub fn reconcile(
        payments: &[Payment],
        worked_days_by_month: &BTreeMap<NaiveDate, u32>,
        global_rate: f64,
        since: Option<NaiveDate>,
        current_month: NaiveDate,
    ) -> Reconciliation {
        let last = month_start(current_month);
        let first = since
            .map(month_start)
            .or_else(|| payments.iter().map(|p| month_start(p.month)).min())
            .unwrap_or(last);
        Self::reconcile_months(
            payments,
            worked_days_by_month,
            global_rate,
            &months_between(first, last),
        )
    }

    /// Reconcile an explicit, chronological list of month starts.
    pub fn reconcile_months(
        payments: &[Payment],
        worked_days_by_month: &BTreeMap<NaiveDate, u32>,
        global_rate: f64,
        months: &[NaiveDate],
    ) -> Reconciliation {
        let by_month = Self::index_payments(payments);

        let per_month: Vec<MonthReconciliation> = months
            .iter()
            .map(|&month| {
                let worked_days = worked_days_by_month.get(&month).copied().unwrap_or(0);
                let estimate = f64::from(worked_days) * global_rate;
                let payment = by_month.get(&month);
                let actual = payment.map_or(0.0, |p| p.amount);
                let paid = payment.is_some();
                MonthReconciliation {
                    month,
                    worked_days,
                    estimate,
                    actual,
                    paid,
                    variance_pct: variance(paid, actual, estimate),
                }
            })
            .collect();

        let totals = Self::totals(&per_month);
        let missing_months = per_month
            .iter()
            .filter(|m| !m.paid)
            .map(|m| m.month)
            .collect::<Vec<_>>();

        debug!(
            months = per_month.len(),
            missing = missing_months.len(),
            "reconciliation computed"
        );

        Reconciliation {
            per_month,
            totals,
            missing_months,
        }
    }

    fn index_payments(payments: &[Payment]) -> HashMap<NaiveDate, &Payment> {
        let mut by_month: HashMap<NaiveDate, &Payment> = HashMap::new();
        for payment in payments {
            let month = month_start(payment.month);
            if let Some(kept) = by_month.get(&month) {
                warn!(
                    month = %month_key(month),
                    kept = %kept.id,
                    ignored = %payment.id,
                    "more than one payment recorded for a month, keeping the first"
                );
                continue;
            }
            by_month.insert(month, payment);
        }
        by_month
    }

    fn totals(per_month: &[MonthReconciliation]) -> ReconciliationTotals {
        let trailing_from = per_month.len().saturating_sub(TRAILING_WINDOW);
        let trailing = &per_month[trailing_from..];

        let variances: Vec<f64> = per_month.iter().filter_map(|m| m.variance_pct).collect();
        let paid: Vec<f64> = per_month
            .iter()
            .filter(|m| m.paid)
            .map(|m| m.actual)
            .collect();

        ReconciliationTotals {
            total_actual: per_month.iter().map(|m| m.actual).sum(),
            total_estimate: per_month.iter().map(|m| m.estimate).sum(),
            total_actual_6: trailing.iter().map(|m| m.actual).sum(),
            total_estimate_6: trailing.iter().map(|m| m.estimate).sum(),
            average_variance_pct: mean(&variances),
            average_actual: mean(&paid),
            paid_months: paid.len(),
            month_count: per_month.len(),
        }
    }
}

fn variance(paid: bool, actual: f64, estimate: f64) -> Option<f64> {
    if !paid || estimate == 0.0 || !estimate.is_finite() {
        return None;
    }
    let pct = (actual - estimate) / estimate * 100.0;
    pct.is_finite().then_some(pct)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
