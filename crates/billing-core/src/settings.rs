use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calendar::{
    parse_date, parse_month, validate_timezone, DateRange, Granularity, ZonedClock,
};
use crate::error::{BillingError, Result};

/// Directory under the home directory holding config, logs, and data.
pub const APP_DIR_NAME: &str = ".mission-billing";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Time-to-revenue reports for freelance missions
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mission-billing",
    about = "Time-to-revenue reports for freelance missions",
    version
)]
pub struct Settings {
    /// Report to produce
    #[arg(long, default_value = "dashboard", value_parser = ["dashboard", "day", "week", "month", "year", "range", "payments"])]
    pub view: String,

    /// Timezone used for day boundaries (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Directory holding missions.json, types.json, payments.json,
    /// parameters.json and entries/*.jsonl
    #[arg(long, env = "MISSION_BILLING_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Anchor day (YYYY-MM-DD); defaults to today in the configured timezone
    #[arg(long)]
    pub date: Option<String>,

    /// First day of the range view (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Last day of the range view (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Bucket width for the range view
    #[arg(long, default_value = "month", value_parser = ["day", "week", "month", "year"])]
    pub granularity: String,

    /// Only count entries of this mission id
    #[arg(long)]
    pub mission: Option<String>,

    /// First month of the payments view (YYYY-MM); defaults to the earliest payment
    #[arg(long)]
    pub since: Option<String>,

    /// Output format
    #[arg(long, default_value = "json", value_parser = ["json", "text"])]
    pub output: String,

    /// Currency symbol appended to amounts in text output
    #[arg(long, default_value = "")]
    pub currency: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.mission-billing/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR_NAME).join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to the default path.
    pub fn save(&self) -> std::result::Result<(), std::io::Error> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the default config file if it exists.
    pub fn clear() -> std::result::Result<(), std::io::Error> {
        Self::clear_at(&Self::config_path())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation. Accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. Date-like arguments are never persisted.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        // clap ids use the field name, not the hyphenated flag.
        if !is_arg_explicitly_set(&matches, "data_dir") && settings.data_dir.is_none() {
            settings.data_dir = last.data_dir;
        }
        if !is_arg_explicitly_set(&matches, "output") {
            if let Some(v) = last.output {
                settings.output = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "currency") {
            if let Some(v) = last.currency {
                settings.currency = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::calendar::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// Reject a `--timezone` that is not an IANA identifier.
    pub fn validate(&self) -> Result<()> {
        if !validate_timezone(&self.timezone) {
            return Err(BillingError::Config(format!(
                "unknown timezone: {}",
                self.timezone
            )));
        }
        Ok(())
    }

    /// Data directory, defaulting to `~/.mission-billing/data`.
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
                .join("data")
        })
    }

    /// The `--date` anchor, or today in the clock's zone.
    pub fn anchor_date(&self, clock: &ZonedClock) -> Result<NaiveDate> {
        match &self.date {
            Some(s) => parse_date(s),
            None => Ok(clock.today()),
        }
    }

    /// The `--since` month, if given.
    pub fn since_month(&self) -> Result<Option<NaiveDate>> {
        self.since.as_deref().map(parse_month).transpose()
    }

    pub fn granularity(&self) -> Result<Granularity> {
        self.granularity.parse()
    }

    /// `--from`/`--to` as a range. Missing bounds default to the start of
    /// the current year and today.
    pub fn date_range(&self, clock: &ZonedClock) -> Result<DateRange> {
        let start = match &self.from {
            Some(s) => parse_date(s)?,
            None => clock.current(Granularity::Year).start,
        };
        let end = match &self.to {
            Some(s) => parse_date(s)?,
            None => clock.today(),
        };
        DateRange::try_new(start, end)
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            view: Some(s.view.clone()),
            timezone: Some(s.timezone.clone()),
            data_dir: s.data_dir.clone(),
            output: Some(s.output.clone()),
            currency: Some(s.currency.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
