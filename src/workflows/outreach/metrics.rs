use super::config::BusinessConfig;
use super::domain::{
    ClvScore, CustomerMetrics, CustomerProfile, GrowthType, MarginSource, OrderPoint,
    ResolvedParams,
};
use super::resolver::ConfigResolver;
use chrono::{Duration, NaiveDate};
use tracing::debug;

const RETURN_RATE_CAP: f64 = 0.95;
const DEGENERATE_RANGE_SCORE: f64 = 0.5;

/// Profile paired with its resolved parameters and derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredCustomer {
    pub profile: CustomerProfile,
    pub params: ResolvedParams,
    pub metrics: CustomerMetrics,
}

/// Derives RFM-style metrics, margin, uplift and CLV for every profile.
///
/// CLV sub-scores are min-max normalised across all customers with at least
/// one valid order. A population with no spread on a sub-score places every
/// positive value at the midpoint. The population pass runs once per call,
/// before any per-customer score is produced.
pub struct MetricEngine<'a> {
    config: &'a BusinessConfig,
    run_date: NaiveDate,
}

impl<'a> MetricEngine<'a> {
    pub fn new(config: &'a BusinessConfig, run_date: NaiveDate) -> Self {
        Self { config, run_date }
    }

    pub fn measure(&self, profiles: Vec<CustomerProfile>) -> Vec<MeasuredCustomer> {
        let resolver = ConfigResolver::new(self.config);

        let staged: Vec<(CustomerProfile, ResolvedParams, CustomerMetrics, ClvInputs)> = profiles
            .into_iter()
            .map(|profile| {
                let params = resolver.resolve(
                    profile.preferred_item.as_deref(),
                    profile.dominant_platform.as_deref(),
                );
                let (metrics, inputs) = self.base_metrics(&profile, &params);
                (profile, params, metrics, inputs)
            })
            .collect();

        let population = PopulationStats::from_inputs(
            staged
                .iter()
                .filter(|(profile, ..)| profile.has_valid_orders())
                .map(|(.., inputs)| inputs),
        );
        debug!(customers = staged.len(), ?population, "clv population statistics");

        staged
            .into_iter()
            .map(|(profile, params, mut metrics, inputs)| {
                if profile.has_valid_orders() {
                    metrics.clv = self.clv_score(&inputs, &population);
                }
                MeasuredCustomer {
                    profile,
                    params,
                    metrics,
                }
            })
            .collect()
    }

    fn base_metrics(
        &self,
        profile: &CustomerProfile,
        params: &ResolvedParams,
    ) -> (CustomerMetrics, ClvInputs) {
        let uplift_settings = &self.config.uplift;
        let valid = profile.valid_orders;

        if valid == 0 {
            let metrics = CustomerMetrics {
                days_since_last_order: None,
                days_since_first_order: None,
                average_order_value: 0.0,
                actual_return_rate: 0.0,
                return_rate: 0.0,
                estimated_margin: 0.0,
                margin_source: MarginSource::NoOrders,
                personal_gap_days: None,
                repurchase_threshold_days: params.category_cycle_days,
                uplift_ratio: 0.0,
                uplift: uplift_settings.floor,
                uplift_ceiling: params.max_estimated_uplift.max(uplift_settings.floor),
                spend_trend: 0.0,
                clv: ClvScore::default(),
                value_tier: self.config.customer_tiers.tier_for(0.0),
                growth_type: GrowthType::Inactive,
            };
            return (metrics, ClvInputs::default());
        }

        let days_since_last = profile
            .last_order
            .map(|date| (self.run_date - date).num_days().max(0));
        let days_since_first = profile
            .first_order
            .map(|date| (self.run_date - date).num_days().max(0));

        let average_order_value = profile.total_payment / f64::from(valid);
        let actual_return_rate = f64::from(profile.returned_orders) / f64::from(valid);
        let return_rate = blended_return_rate(valid, actual_return_rate, params.expected_return_rate);

        let (estimated_margin, margin_source) = match profile.gross_profit {
            Some(profit) => (profit / f64::from(valid), MarginSource::GrossProfit),
            None => (
                average_order_value * params.gross_margin,
                MarginSource::CategoryMargin,
            ),
        };
        let estimated_margin = estimated_margin.clamp(0.0, params.max_estimated_margin);

        let personal_gap_days = average_gap_days(profile);
        if valid >= 2 && personal_gap_days.is_none() {
            debug!(customer = %profile.key, "orders share one day, using category cycle");
        }
        let repurchase_threshold_days = personal_gap_days.unwrap_or(params.category_cycle_days);

        let premium = valid >= uplift_settings.premium_min_orders
            && return_rate < uplift_settings.premium_max_return_rate;
        let uplift_ceiling = if premium {
            uplift_settings.premium_ceiling.max(params.max_estimated_uplift)
        } else {
            params.max_estimated_uplift
        }
        .max(uplift_settings.floor);

        let uplift_ratio = days_since_last.unwrap_or(0) as f64 / repurchase_threshold_days;
        let uplift = (uplift_settings.base + (uplift_ratio - 1.0).max(0.0))
            .clamp(uplift_settings.floor, uplift_ceiling);

        let spend_trend = relative_spend_trend(&profile.history);
        let growth_type = self.growth_type(
            valid,
            spend_trend,
            days_since_first.unwrap_or(0),
            average_order_value,
        );

        let inputs = ClvInputs {
            spend: profile.total_payment,
            orders: f64::from(valid),
            activity: self.activity_raw(
                &profile.history,
                profile.total_payment,
                days_since_last.unwrap_or(0),
                repurchase_threshold_days,
            ),
            growth: growth_raw(spend_trend, &profile.history),
        };

        let metrics = CustomerMetrics {
            days_since_last_order: days_since_last,
            days_since_first_order: days_since_first,
            average_order_value,
            actual_return_rate,
            return_rate,
            estimated_margin,
            margin_source,
            personal_gap_days,
            repurchase_threshold_days,
            uplift_ratio,
            uplift,
            uplift_ceiling,
            spend_trend,
            clv: ClvScore::default(),
            value_tier: self.config.customer_tiers.tier_for(profile.total_payment),
            growth_type,
        };

        (metrics, inputs)
    }

    fn growth_type(
        &self,
        valid: u32,
        spend_trend: f64,
        days_since_first: i64,
        average_order_value: f64,
    ) -> GrowthType {
        let growth = &self.config.growth;
        if valid >= 3 {
            if spend_trend >= growth.trend_threshold {
                GrowthType::Growing
            } else if spend_trend <= -growth.trend_threshold {
                GrowthType::Declining
            } else {
                GrowthType::Stable
            }
        } else if days_since_first <= i64::from(growth.new_customer_days)
            && average_order_value >= growth.high_potential_aov
        {
            GrowthType::HighPotentialNew
        } else if valid == 1 {
            GrowthType::New
        } else {
            GrowthType::Stable
        }
    }

    /// Recent-spend share scaled down the further the customer is past their cadence.
    fn activity_raw(
        &self,
        history: &[OrderPoint],
        total_spend: f64,
        days_since_last: i64,
        threshold_days: f64,
    ) -> f64 {
        if total_spend <= 0.0 {
            return 0.0;
        }
        let window_start =
            self.run_date - Duration::days(i64::from(self.config.clv_weights.activity_window_days));
        let recent: f64 = history
            .iter()
            .filter(|point| point.date > window_start)
            .map(|point| point.amount)
            .sum();
        let recency_factor = 1.0 / (1.0 + days_since_last as f64 / threshold_days);
        (recent / total_spend).clamp(0.0, 1.0) * recency_factor
    }

    fn clv_score(&self, inputs: &ClvInputs, population: &PopulationStats) -> ClvScore {
        let weights = &self.config.clv_weights;
        let historical =
            0.5 * population.spend.normalize(inputs.spend) + 0.5 * population.orders.normalize(inputs.orders);
        let activity = population.activity.normalize(inputs.activity);
        let growth = population.growth.normalize(inputs.growth);

        let total_weight = weights.historical + weights.activity + weights.growth;
        let weighted = weights.historical * historical
            + weights.activity * activity
            + weights.growth * growth;
        let score = (100.0 * weighted / total_weight).clamp(0.0, 100.0);

        ClvScore {
            historical,
            activity,
            growth,
            score,
        }
    }
}

/// Blends observed and expected return rates by sample size; capped at 0.95.
pub fn blended_return_rate(valid_orders: u32, actual: f64, expected: f64) -> f64 {
    let blended = match valid_orders {
        0 => 0.0,
        1 | 2 => actual.max(expected),
        _ => 0.7 * actual + 0.3 * expected,
    };
    blended.clamp(0.0, RETURN_RATE_CAP)
}

fn average_gap_days(profile: &CustomerProfile) -> Option<f64> {
    if profile.valid_orders < 2 {
        return None;
    }
    let (first, last) = (profile.first_order?, profile.last_order?);
    let gap = (last - first).num_days() as f64 / f64::from(profile.valid_orders - 1);
    (gap >= 1.0).then_some(gap)
}

/// Least-squares slope of order amounts over order index, relative to the mean amount.
fn relative_spend_trend(history: &[OrderPoint]) -> f64 {
    let n = history.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = history.iter().map(|point| point.amount).sum::<f64>() / n_f;
    if mean_y <= 0.0 {
        return 0.0;
    }

    let (mut covariance, mut variance) = (0.0, 0.0);
    for (index, point) in history.iter().enumerate() {
        let dx = index as f64 - mean_x;
        covariance += dx * (point.amount - mean_y);
        variance += dx * dx;
    }
    ((covariance / variance) / mean_y).clamp(-1.0, 1.0)
}

/// 1 minus the coefficient of variation of inter-order gaps; needs two gaps.
fn repurchase_stability(history: &[OrderPoint]) -> f64 {
    let gaps: Vec<f64> = history
        .windows(2)
        .map(|pair| (pair[1].date - pair[0].date).num_days() as f64)
        .collect();
    if gaps.len() < 2 {
        return 0.0;
    }
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = gaps.iter().map(|gap| (gap - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

fn growth_raw(spend_trend: f64, history: &[OrderPoint]) -> f64 {
    0.6 * (spend_trend + 1.0) / 2.0 + 0.4 * repurchase_stability(history)
}

#[derive(Debug, Clone, Copy, Default)]
struct ClvInputs {
    spend: f64,
    orders: f64,
    activity: f64,
    growth: f64,
}

#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn normalize(&self, value: f64) -> f64 {
        if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else if value > 0.0 {
            DEGENERATE_RANGE_SCORE
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PopulationStats {
    spend: Range,
    orders: Range,
    activity: Range,
    growth: Range,
}

impl PopulationStats {
    fn from_inputs<'i>(inputs: impl Iterator<Item = &'i ClvInputs>) -> Self {
        let mut stats = Self {
            spend: Range::empty(),
            orders: Range::empty(),
            activity: Range::empty(),
            growth: Range::empty(),
        };
        for input in inputs {
            stats.spend.include(input.spend);
            stats.orders.include(input.orders);
            stats.activity.include(input.activity);
            stats.growth.include(input.growth);
        }
        stats
    }
}
