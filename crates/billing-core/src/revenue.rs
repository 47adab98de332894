use crate::models::Mission;

/// Minutes in one billable day when a mission does not define its own (7h30).
pub const DEFAULT_BASELINE_MINUTES: f64 = 450.0;

/// Anything that carries the rate inputs of the revenue formula.
pub trait RateCard {
    /// Amount billed for one full baseline day, if known.
    fn daily_rate(&self) -> Option<f64>;
    /// Minutes considered one full billable day, if configured.
    fn baseline_daily_minutes(&self) -> Option<f64>;
}

impl RateCard for Mission {
    fn daily_rate(&self) -> Option<f64> {
        self.daily_rate
    }

    fn baseline_daily_minutes(&self) -> Option<f64> {
        self.baseline_daily_minutes
    }
}

// ── RevenueEstimator ──────────────────────────────────────────────────────────

/// The single conversion from worked minutes to money.
///
/// `amount = (minutes / baseline) * daily_rate`. Results are unrounded;
/// rounding happens once, when values leave the engine.
pub struct RevenueEstimator;

impl RevenueEstimator {
    /// Estimate the amount earned for `minutes` of work on `card`.
    ///
    /// Returns `0.0` for zero minutes and for an unknown rate. A zero amount
    /// therefore does not imply zero work; callers keep minutes alongside.
    pub fn estimate<R: RateCard + ?Sized>(minutes: u64, card: &R) -> f64 {
        if minutes == 0 {
            return 0.0;
        }
        let rate = Self::effective_rate(card);
        if rate == 0.0 {
            return 0.0;
        }
        (minutes as f64 / Self::effective_baseline(card)) * rate
    }

    /// Like [`RevenueEstimator::estimate`] for a possibly unknown mission.
    pub fn estimate_opt<R: RateCard>(minutes: u64, card: Option<&R>) -> f64 {
        card.map_or(0.0, |c| Self::estimate(minutes, c))
    }

    /// Baseline minutes per day: the configured value when it is a positive
    /// finite number, otherwise [`DEFAULT_BASELINE_MINUTES`].
    pub fn effective_baseline<R: RateCard + ?Sized>(card: &R) -> f64 {
        match card.baseline_daily_minutes() {
            Some(b) if b.is_finite() && b > 0.0 => b,
            _ => DEFAULT_BASELINE_MINUTES,
        }
    }

    /// Daily rate, treating unknown, negative, or non-finite values as zero.
    pub fn effective_rate<R: RateCard + ?Sized>(card: &R) -> f64 {
        match card.daily_rate() {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => 0.0,
        }
    }

    /// Whether estimates for `card` are meaningful.
    pub fn has_rate<R: RateCard + ?Sized>(card: &R) -> bool {
        Self::effective_rate(card) > 0.0
    }
}
