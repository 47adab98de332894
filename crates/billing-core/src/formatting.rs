/// Round to 2 decimal places.
///
/// This is the only rounding step applied to monetary values and
/// percentages, and it runs where values leave the engine.
///
/// # Examples
///
/// ```
/// use billing_core::formatting::round2;
///
/// assert_eq!(round2(11.111_111), 11.11);
/// assert_eq!(round2(1.005), 1.01);
/// assert_eq!(round2(-2.499), -2.5);
/// ```
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // Nudge by the representation error at this magnitude so exact
    // midpoints like 1.005 round away from zero.
    let scaled = value * 100.0;
    let epsilon = f64::EPSILON * scaled.abs();
    let rounded = (scaled + epsilon.copysign(scaled)).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Serde adapter emitting an `f64` through [`round2`].
pub mod rounded {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(super::round2(*value))
    }
}

/// Serde adapter emitting an `Option<f64>` through [`round2`].
pub mod rounded_opt {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_some(&super::round2(*v)),
            None => s.serialize_none(),
        }
    }
}

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use billing_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a monetary amount with two decimals, thousands separators, and an
/// optional currency symbol appended after a space.
///
/// # Examples
///
/// ```
/// use billing_core::formatting::format_amount;
///
/// assert_eq!(format_amount(1234.56, "EUR"), "1,234.56 EUR");
/// assert_eq!(format_amount(0.0, ""), "0.00");
/// ```
pub fn format_amount(amount: f64, symbol: &str) -> String {
    let number = format_number(amount, 2);
    if symbol.is_empty() {
        number
    } else {
        format!("{} {}", number, symbol)
    }
}

/// Format a duration in whole minutes.
///
/// * `< 60` minutes → `"45m"`
/// * `≥ 60` minutes, no remainder → `"3h"`
/// * `≥ 60` minutes, with remainder → `"7h 30m"`
pub fn format_time(minutes: u64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Format a signed variance percentage, or `"n/a"` when undefined.
///
/// # Examples
///
/// ```
/// use billing_core::formatting::format_variance;
///
/// assert_eq!(format_variance(Some(11.111)), "+11.11%");
/// assert_eq!(format_variance(Some(-4.0)), "-4.00%");
/// assert_eq!(format_variance(None), "n/a");
/// ```
pub fn format_variance(pct: Option<f64>) -> String {
    match pct {
        Some(p) if p > 0.0 => format!("+{}%", format_number(p, 2)),
        Some(p) => format!("{}%", format_number(p, 2)),
        None => "n/a".to_string(),
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── round2 ───────────────────────────────────────────────────────────────

    #[test]
    fn test_round2_midpoint() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(0.125), 0.13);
    }

    #[test]
    fn test_round2_accumulated_float_noise() {
        let sum: f64 = (0..10).map(|_| 0.1).sum();
        assert_eq!(round2(sum), 1.0);
        assert_eq!(round2(299.999_999_9), 300.0);
    }

    #[test]
    fn test_round2_negative_and_zero() {
        assert_eq!(round2(-0.004), 0.0);
        assert!(round2(-0.004).is_sign_positive());
        assert_eq!(round2(-12.345), -12.35);
    }

    #[test]
    fn test_rounded_serde_adapters() {
        #[derive(serde::Serialize)]
        struct Row {
            #[serde(serialize_with = "rounded::serialize")]
            amount: f64,
            #[serde(serialize_with = "rounded_opt::serialize")]
            pct: Option<f64>,
            #[serde(serialize_with = "rounded_opt::serialize")]
            missing: Option<f64>,
        }
        let json = serde_json::to_string(&Row {
            amount: 1_799.999_999,
            pct: Some(11.111_111),
            missing: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"amount":1800.0,"pct":11.11,"missing":null}"#);
    }

    #[test]
    fn test_round2_non_finite_passthrough() {
        assert!(round2(f64::NAN).is_nan());
        assert_eq!(round2(f64::INFINITY), f64::INFINITY);
    }

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_000.0, 0), "1,000");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    // ── format_amount ────────────────────────────────────────────────────────

    #[test]
    fn test_format_amount_with_symbol() {
        assert_eq!(format_amount(1_800.0, "EUR"), "1,800.00 EUR");
    }

    #[test]
    fn test_format_amount_without_symbol() {
        assert_eq!(format_amount(1_000_000.0, ""), "1,000,000.00");
    }

    // ── format_time ──────────────────────────────────────────────────────────

    #[test]
    fn test_format_time_under_hour() {
        assert_eq!(format_time(0), "0m");
        assert_eq!(format_time(45), "45m");
    }

    #[test]
    fn test_format_time_exact_hours() {
        assert_eq!(format_time(60), "1h");
        assert_eq!(format_time(480), "8h");
    }

    #[test]
    fn test_format_time_baseline_day() {
        assert_eq!(format_time(450), "7h 30m");
    }

    // ── format_variance ──────────────────────────────────────────────────────

    #[test]
    fn test_format_variance_zero() {
        assert_eq!(format_variance(Some(0.0)), "0.00%");
    }
}
