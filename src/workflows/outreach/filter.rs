use super::config::{FilterSettings, SingleOrderPolicy, SingleOrderScope};
use super::domain::{
    CooldownSource, CustomerKey, CustomerMetrics, CustomerRecord, GrowthType, ResolvedParams,
};
use super::options::RunOptions;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// `max(personal * multiplier, category * multiplier, default_churn_days)`.
///
/// Customers without a personal cadence use the category cycle for both terms.
pub fn churn_threshold_days(
    metrics: &CustomerMetrics,
    params: &ResolvedParams,
    churn_multiplier: f64,
    default_churn_days: f64,
) -> f64 {
    let personal = metrics
        .personal_gap_days
        .unwrap_or(params.category_cycle_days)
        * churn_multiplier;
    let category = params.category_cycle_days * churn_multiplier;
    personal.max(category).max(default_churn_days)
}

/// Why a customer was left out of the action list. Only the first failing
/// rule is reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    NoValidOrders,
    SingleOrderPolicy,
    NotQualified,
    HighReturnRate { actual_return_rate: f64 },
    RecentOrder { days_since_last_order: i64 },
    Cooldown { last_contact: NaiveDate, days_since_contact: i64 },
    OutsideAnniversaryWindow,
}

impl ExclusionReason {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoValidOrders => "no_valid_orders",
            Self::SingleOrderPolicy => "single_order_policy",
            Self::NotQualified => "not_qualified",
            Self::HighReturnRate { .. } => "high_return_rate",
            Self::RecentOrder { .. } => "recent_order",
            Self::Cooldown { .. } => "cooldown",
            Self::OutsideAnniversaryWindow => "outside_anniversary_window",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub customer: CustomerKey,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Indices into the customer set that passed every rule, in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOutcome {
    pub selected: Vec<usize>,
    pub exclusions: Vec<Exclusion>,
    pub cooldown_applied: bool,
}

/// Selects outreach candidates from the scored customer set without touching scores.
pub struct ActionFilter<'a> {
    settings: &'a FilterSettings,
    single_order: &'a SingleOrderPolicy,
    options: &'a RunOptions,
}

impl<'a> ActionFilter<'a> {
    pub fn new(
        settings: &'a FilterSettings,
        single_order: &'a SingleOrderPolicy,
        options: &'a RunOptions,
    ) -> Self {
        Self {
            settings,
            single_order,
            options,
        }
    }

    pub fn apply(&self, customers: &[CustomerRecord], cooldown: &CooldownSource) -> FilterOutcome {
        let mut outcome = FilterOutcome {
            cooldown_applied: cooldown.is_available(),
            ..FilterOutcome::default()
        };

        for (index, customer) in customers.iter().enumerate() {
            match self.check(customer, cooldown) {
                Ok(()) => outcome.selected.push(index),
                Err(reason) => outcome.exclusions.push(Exclusion {
                    customer: customer.key().clone(),
                    reason,
                }),
            }
        }

        outcome
    }

    pub fn check(
        &self,
        customer: &CustomerRecord,
        cooldown: &CooldownSource,
    ) -> Result<(), ExclusionReason> {
        let profile = &customer.profile;
        let metrics = &customer.metrics;
        let run_date = self.options.run_date;

        let Some(days_since_last) = metrics.days_since_last_order else {
            return Err(ExclusionReason::NoValidOrders);
        };

        if profile.valid_orders == 1 && !self.single_order_allowed(profile.last_order, run_date) {
            return Err(ExclusionReason::SingleOrderPolicy);
        }

        if !self.qualifies(customer) {
            return Err(ExclusionReason::NotQualified);
        }

        if metrics.actual_return_rate >= 1.0 && !self.options.allow_high_return {
            return Err(ExclusionReason::HighReturnRate {
                actual_return_rate: metrics.actual_return_rate,
            });
        }

        let recent_window = self.options.exclude_recent_days;
        if recent_window > 0 && days_since_last <= i64::from(recent_window) {
            return Err(ExclusionReason::RecentOrder {
                days_since_last_order: days_since_last,
            });
        }

        if let (CooldownSource::Available(log), Some(phone)) = (cooldown, profile.phone.as_deref())
        {
            if let Some(last_contact) = log.last_contact(phone) {
                let days_since_contact = (run_date - last_contact).num_days();
                if days_since_contact <= i64::from(self.options.cooldown_days) {
                    return Err(ExclusionReason::Cooldown {
                        last_contact,
                        days_since_contact,
                    });
                }
            }
        }

        let windows = &self.options.anniversary_windows;
        if !windows.is_empty() {
            let in_window = profile
                .first_order
                .map(|first| windows.iter().any(|window| window.contains(first)))
                .unwrap_or(false);
            if !in_window {
                return Err(ExclusionReason::OutsideAnniversaryWindow);
            }
        }

        Ok(())
    }

    fn qualifies(&self, customer: &CustomerRecord) -> bool {
        let tagged = self
            .settings
            .qualifying_tags
            .iter()
            .any(|tag| customer.has_tag(*tag));
        tagged
            || customer.score() >= self.settings.min_priority_score
            || customer.profile.valid_orders >= self.settings.min_orders
            || matches!(
                customer.metrics.growth_type,
                GrowthType::Growing | GrowthType::HighPotentialNew
            )
    }

    fn single_order_allowed(&self, order_date: Option<NaiveDate>, run_date: NaiveDate) -> bool {
        if !self.single_order.enabled {
            return false;
        }
        match (self.single_order.scope, order_date) {
            (SingleOrderScope::Any, _) => true,
            (SingleOrderScope::PreviousMonth, Some(date)) => in_previous_month(date, run_date),
            (SingleOrderScope::PreviousMonth, None) => false,
        }
    }
}

/// True when `date` falls in the calendar month immediately before `run_date`.
pub(crate) fn in_previous_month(date: NaiveDate, run_date: NaiveDate) -> bool {
    let (year, month) = if run_date.month() == 1 {
        (run_date.year() - 1, 12)
    } else {
        (run_date.year(), run_date.month() - 1)
    };
    date.year() == year && date.month() == month
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn previous_month_handles_year_boundary() {
        assert!(in_previous_month(date(2024, 12, 31), date(2025, 1, 10)));
        assert!(in_previous_month(date(2025, 10, 1), date(2025, 11, 12)));
        assert!(!in_previous_month(date(2025, 9, 30), date(2025, 11, 12)));
        assert!(!in_previous_month(date(2025, 11, 1), date(2025, 11, 12)));
        assert!(!in_previous_month(date(2024, 10, 15), date(2025, 11, 12)));
    }
}
