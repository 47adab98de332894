mod bootstrap;
mod render;

use anyhow::{Context, Result};
use billing_core::calendar::ZonedClock;
use billing_core::settings::Settings;
use billing_data::reports;
use billing_data::store::JsonStore;
use chrono::Utc;
use serde::Serialize;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;
    settings.validate()?;

    tracing::info!("Mission billing v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Timezone: {}, Output: {}",
        settings.view,
        settings.timezone,
        settings.output
    );

    let clock = ZonedClock::new(&settings.timezone, Utc::now());
    let data_path = settings.data_path();
    let store = JsonStore::open(&data_path)
        .with_context(|| format!("opening data directory {}", data_path.display()))?;

    let mission = settings.mission.as_deref();
    let currency = settings.currency.as_str();
    let json = settings.output == "json";

    let output = match settings.view.as_str() {
        "dashboard" => {
            let dash = reports::dashboard(&store, &clock)?;
            emit(json, &dash, || render::render_dashboard(&dash, currency))?
        }
        "day" => {
            let date = settings.anchor_date(&clock)?;
            let day = reports::day_breakdown(&store, date, mission)?;
            emit(json, &day, || render::render_day(&day, currency))?
        }
        "week" => {
            let anchor = settings.anchor_date(&clock)?;
            let report = reports::weekly_export(&store, anchor, mission)?;
            emit(json, &report, || render::render_period(&report, currency))?
        }
        "month" => {
            let anchor = settings.anchor_date(&clock)?;
            let report = reports::monthly_export(&store, anchor, mission)?;
            emit(json, &report, || render::render_period(&report, currency))?
        }
        "year" => {
            let anchor = settings.anchor_date(&clock)?;
            let report = reports::yearly_export(&store, anchor, mission)?;
            emit(json, &report, || render::render_period(&report, currency))?
        }
        "range" => {
            let range = settings.date_range(&clock)?;
            let granularity = settings.granularity()?;
            let report = reports::range_report(&store, range, granularity, mission)?;
            emit(json, &report, || render::render_period(&report, currency))?
        }
        "payments" => {
            let since = settings.since_month()?;
            let rec = reports::payment_statistics(&store, &clock, since)?;
            emit(json, &rec, || render::render_payments(&rec, currency))?
        }
        unknown => anyhow::bail!("unknown view: {unknown}"),
    };

    println!("{output}");
    Ok(())
}

/// Pretty JSON, or the plain-text rendering.
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text())
    }
}
