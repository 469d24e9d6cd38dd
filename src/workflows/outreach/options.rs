use super::config::BusinessConfig;
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Flat per-run parameters. Built from the configuration's `filters` section
/// and then overridden by whatever the caller supplies.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub run_date: NaiveDate,
    pub cooldown_days: u32,
    pub churn_multiplier: f64,
    pub default_churn_days: f64,
    pub exclude_recent_days: u32,
    pub allow_high_return: bool,
    pub max_action_count: Option<usize>,
    pub anniversary_windows: Vec<AnniversaryWindow>,
}

impl RunOptions {
    pub fn from_config(config: &BusinessConfig, run_date: NaiveDate) -> Self {
        let filters = &config.filters;
        Self {
            run_date,
            cooldown_days: filters.cooldown_days,
            churn_multiplier: filters.churn_multiplier,
            default_churn_days: filters.default_churn_days,
            exclude_recent_days: filters.exclude_recent_days,
            allow_high_return: filters.allow_high_return,
            max_action_count: filters.max_action_count,
            anniversary_windows: Vec::new(),
        }
    }
}

/// Inclusive month/day window, e.g. `11:10-20` for November 10th through 20th.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnniversaryWindow {
    pub month: u32,
    pub from_day: u32,
    pub to_day: u32,
}

impl AnniversaryWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.month() == self.month && (self.from_day..=self.to_day).contains(&date.day())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnniversaryWindowParseError(String);

impl fmt::Display for AnniversaryWindowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid anniversary window '{}': expected MONTH:FROM-TO such as 11:10-20",
            self.0
        )
    }
}

impl std::error::Error for AnniversaryWindowParseError {}

impl FromStr for AnniversaryWindow {
    type Err = AnniversaryWindowParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let error = || AnniversaryWindowParseError(raw.to_string());
        let (month, days) = raw.trim().split_once(':').ok_or_else(error)?;
        let (from_day, to_day) = match days.split_once('-') {
            Some((from, to)) => (from, to),
            None => (days, days),
        };

        let month: u32 = month.trim().parse().map_err(|_| error())?;
        let from_day: u32 = from_day.trim().parse().map_err(|_| error())?;
        let to_day: u32 = to_day.trim().parse().map_err(|_| error())?;

        if !(1..=12).contains(&month) || from_day == 0 || to_day > 31 || from_day > to_day {
            return Err(error());
        }

        Ok(Self {
            month,
            from_day,
            to_day,
        })
    }
}
