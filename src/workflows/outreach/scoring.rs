use super::config::{BoostCondition, BusinessConfig};
use super::domain::{
    AppliedBoost, CustomerMetrics, CustomerProfile, CustomerRecord, CustomerTag, GrowthType,
    PriorityAssessment, PriorityBucket, ResolvedParams, ScoreBreakdown, ValueTier,
};
use super::filter::churn_threshold_days;
use super::metrics::MeasuredCustomer;
use super::options::RunOptions;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

/// Assigns tags and the priority score.
///
/// `score = uplift * margin * (1 - return_rate) * confidence - touch_cost + boosts`,
/// where confidence dampens thin order histories and boosts come from the
/// configured rule table.
pub struct PriorityScorer<'a> {
    config: &'a BusinessConfig,
    options: &'a RunOptions,
}

impl<'a> PriorityScorer<'a> {
    pub fn new(config: &'a BusinessConfig, options: &'a RunOptions) -> Self {
        Self { config, options }
    }

    pub fn score_all(&self, measured: Vec<MeasuredCustomer>) -> Vec<CustomerRecord> {
        measured
            .into_iter()
            .map(|customer| {
                let assessment =
                    self.assess(&customer.profile, &customer.params, &customer.metrics);
                CustomerRecord {
                    profile: customer.profile,
                    params: customer.params,
                    metrics: customer.metrics,
                    assessment,
                }
            })
            .collect()
    }

    /// Pure function of the inputs; calling it twice yields the same assessment.
    pub fn assess(
        &self,
        profile: &CustomerProfile,
        params: &ResolvedParams,
        metrics: &CustomerMetrics,
    ) -> PriorityAssessment {
        let churn_threshold = churn_threshold_days(
            metrics,
            params,
            self.options.churn_multiplier,
            self.options.default_churn_days,
        );
        let tags = self.tags(profile, metrics, churn_threshold);

        let confidence_weight = self
            .config
            .orders_dampening
            .weight_for(profile.valid_orders);
        let expected_value = metrics.uplift
            * metrics.estimated_margin
            * (1.0 - metrics.return_rate)
            * confidence_weight;
        let base_score = expected_value - params.touch_cost;

        let boosts: Vec<AppliedBoost> = self
            .config
            .priority_boosts
            .iter()
            .filter(|rule| boost_applies(&rule.when, profile, metrics, &tags))
            .map(|rule| AppliedBoost {
                rule: rule.name.clone(),
                points: rule.points,
            })
            .collect();

        let score = base_score + boosts.iter().map(|boost| boost.points).sum::<f64>();

        PriorityAssessment {
            score,
            bucket: PriorityBucket::from_score(score),
            churn_threshold_days: churn_threshold,
            tags,
            breakdown: ScoreBreakdown {
                uplift: metrics.uplift,
                estimated_margin: metrics.estimated_margin,
                return_rate: metrics.return_rate,
                confidence_weight,
                touch_cost: params.touch_cost,
                base_score,
                boosts,
            },
        }
    }

    fn tags(
        &self,
        profile: &CustomerProfile,
        metrics: &CustomerMetrics,
        churn_threshold: f64,
    ) -> BTreeSet<CustomerTag> {
        let mut tags = BTreeSet::new();
        let Some(days_since_last) = metrics.days_since_last_order else {
            return tags;
        };
        let thresholds = &self.config.tags;
        let days = days_since_last as f64;

        if days >= churn_threshold {
            tags.insert(CustomerTag::ChurnRiskLongTerm);
        } else if days >= (churn_threshold / 2.0).max(1.0) {
            tags.insert(CustomerTag::ChurnRiskShortTerm);
        }

        if let Some((last, earlier)) = profile.history.split_last() {
            if earlier.len() >= 2 {
                let earlier_mean =
                    earlier.iter().map(|point| point.amount).sum::<f64>() / earlier.len() as f64;
                if last.amount < thresholds.spend_drop_ratio * earlier_mean {
                    tags.insert(CustomerTag::SpendDrop);
                }
            }
        }

        let window_start = profile
            .history
            .len()
            .saturating_sub(thresholds.return_spike_window);
        let recent_returns = profile.history[window_start..]
            .iter()
            .filter(|point| point.returned)
            .count();
        if recent_returns >= thresholds.return_spike_min_returns.max(1) {
            tags.insert(CustomerTag::ReturnSpike);
        }

        if let Some(first_order) = profile.first_order {
            if anniversary_due(
                first_order,
                self.options.run_date,
                thresholds.anniversary_lead_days,
            ) {
                tags.insert(CustomerTag::Anniversary);
            }
        }

        if metrics.value_tier == ValueTier::High
            && days <= metrics.repurchase_threshold_days
        {
            tags.insert(CustomerTag::HighValueActive);
        }

        let clv = metrics.clv.score;
        if clv >= thresholds.star_min_clv {
            tags.insert(CustomerTag::Star);
        } else if clv >= thresholds.potential_min_clv
            || metrics.growth_type == GrowthType::HighPotentialNew
        {
            tags.insert(CustomerTag::Potential);
        }

        if metrics.growth_type == GrowthType::Growing {
            tags.insert(CustomerTag::Growing);
        }

        tags
    }
}

fn boost_applies(
    condition: &BoostCondition,
    profile: &CustomerProfile,
    metrics: &CustomerMetrics,
    tags: &BTreeSet<CustomerTag>,
) -> bool {
    match condition {
        BoostCondition::Tag(tag) => tags.contains(tag),
        BoostCondition::MinOrders(minimum) => profile.valid_orders >= *minimum,
        BoostCondition::MinClv(minimum) => metrics.clv.score >= *minimum,
        BoostCondition::ValueTier(tier) => metrics.value_tier == *tier,
        BoostCondition::GrowthType(growth) => metrics.growth_type == *growth,
    }
}

fn same_day_in_year(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}

/// True when a yearly anniversary of the first order falls within the next
/// `lead_days` days (inclusive of today). The first order itself never counts.
pub(crate) fn anniversary_due(first_order: NaiveDate, run_date: NaiveDate, lead_days: u32) -> bool {
    [run_date.year(), run_date.year() + 1]
        .into_iter()
        .filter(|year| *year > first_order.year())
        .filter_map(|year| same_day_in_year(first_order, year))
        .find(|anniversary| *anniversary >= run_date)
        .map(|anniversary| (anniversary - run_date).num_days() <= i64::from(lead_days))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn anniversary_window_is_forward_looking() {
        let run = date(2025, 11, 12);
        assert!(anniversary_due(date(2023, 11, 12), run, 7));
        assert!(anniversary_due(date(2024, 11, 19), run, 7));
        assert!(!anniversary_due(date(2024, 11, 20), run, 7));
        assert!(!anniversary_due(date(2024, 11, 11), run, 7));
        assert!(!anniversary_due(date(2025, 11, 12), run, 7));
    }

    #[test]
    fn anniversary_wraps_into_next_year() {
        assert!(anniversary_due(date(2023, 1, 2), date(2025, 12, 30), 7));
    }

    #[test]
    fn leap_day_anniversary_falls_back_to_feb_28() {
        assert!(anniversary_due(date(2024, 2, 29), date(2025, 2, 25), 7));
    }
}
