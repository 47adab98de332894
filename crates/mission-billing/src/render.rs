//! Plain-text tables for the `--output text` mode.
//!
//! One row per bucket or month plus a totals row at the bottom. All
//! amounts go through [`format_amount`], so they are rounded to 2 decimals.

use std::fmt::Write as _;

use billing_core::calendar::month_key;
use billing_core::formatting::{format_amount, format_time, format_variance};
use billing_data::reconciler::Reconciliation;
use billing_data::reports::{Dashboard, DayBreakdown, PeriodReport, SummaryCard};

const RULE: &str = "────────────────────────────────────────────────────────────────";

/// Bucket table: label, time, amount, worked days, top mission.
pub fn render_period(report: &PeriodReport, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} report {} → {}",
        report.granularity, report.range.start, report.range.end
    );
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>16} {:>5}  {}",
        "Period", "Time", "Amount", "Days", "Top mission"
    );
    for bucket in &report.buckets {
        let top = bucket
            .by_mission
            .first()
            .map(|m| m.title.as_str())
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>16} {:>5}  {}",
            bucket.label,
            format_time(bucket.total_minutes),
            format_amount(bucket.total_amount, currency),
            bucket.worked_days,
            top
        );
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>16} {:>5}",
        "Total",
        format_time(report.totals.total_minutes),
        format_amount(report.totals.total_amount, currency),
        report.totals.worked_days
    );
    out
}

pub fn render_day(day: &DayBreakdown, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Day {}", day.date);
    let _ = writeln!(out, "{RULE}");
    for mission in &day.summary.by_mission {
        let amount = if mission.has_rate {
            format_amount(mission.amount, currency)
        } else {
            "no rate".to_string()
        };
        let _ = writeln!(
            out,
            "{:<28} {:>10} {:>16}",
            mission.title,
            format_time(mission.minutes),
            amount
        );
    }
    if !day.entries.is_empty() {
        let _ = writeln!(out);
        for entry in &day.entries {
            let _ = writeln!(
                out,
                "  {:<24} {:<16} {:>8}  {}",
                entry.mission_title,
                entry.type_name,
                format_time(u64::from(entry.duration_minutes)),
                entry.description.as_deref().unwrap_or("")
            );
        }
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "{:<28} {:>10} {:>16}",
        "Total",
        format_time(day.summary.total_minutes),
        format_amount(day.summary.total_amount, currency)
    );
    out
}

pub fn render_dashboard(dash: &Dashboard, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dashboard {} ({})", dash.today, dash.timezone);
    let _ = writeln!(out, "{RULE}");
    for (name, card) in [
        ("Today", &dash.day),
        ("This week", &dash.week),
        ("This month", &dash.month),
        ("This year", &dash.year),
    ] {
        let _ = writeln!(out, "{}", card_line(name, card, currency));
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Worked days this month: {}", dash.worked_days_this_month);
    if let Some(kind) = &dash.most_used_type_this_month {
        let _ = writeln!(
            out,
            "Most used type this month: {} ({})",
            kind.name,
            format_time(kind.minutes)
        );
    }
    if let Some(mission) = &dash.top_mission_today {
        let _ = writeln!(
            out,
            "Top mission today: {} ({})",
            mission.title,
            format_amount(mission.amount, currency)
        );
    }
    out
}

fn card_line(name: &str, card: &SummaryCard, currency: &str) -> String {
    format!(
        "{:<12} {:>10} {:>16} {:>4} d",
        name,
        format_time(card.total_minutes),
        format_amount(card.total_amount, currency),
        card.worked_days
    )
}

pub fn render_payments(rec: &Reconciliation, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:>5} {:>16} {:>16} {:>10}",
        "Month", "Days", "Estimate", "Actual", "Variance"
    );
    let _ = writeln!(out, "{RULE}");
    for month in &rec.per_month {
        let actual = if month.paid {
            format_amount(month.actual, currency)
        } else {
            "unpaid".to_string()
        };
        let _ = writeln!(
            out,
            "{:<8} {:>5} {:>16} {:>16} {:>10}",
            month_key(month.month),
            month.worked_days,
            format_amount(month.estimate, currency),
            actual,
            format_variance(month.variance_pct)
        );
    }
    let _ = writeln!(out, "{RULE}");
    let totals = &rec.totals;
    let _ = writeln!(
        out,
        "{:<8} {:>5} {:>16} {:>16} {:>10}",
        "Total",
        "",
        format_amount(totals.total_estimate, currency),
        format_amount(totals.total_actual, currency),
        format_variance(totals.average_variance_pct)
    );
    let _ = writeln!(
        out,
        "{:<8} {:>5} {:>16} {:>16}",
        "Last 6",
        "",
        format_amount(totals.total_estimate_6, currency),
        format_amount(totals.total_actual_6, currency)
    );
    if !rec.missing_months.is_empty() {
        let missing: Vec<String> = rec.missing_months.iter().map(|m| month_key(*m)).collect();
        let _ = writeln!(out, "Missing payments: {}", missing.join(", "));
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
